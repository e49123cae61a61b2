//! Reading input text files.

use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

/// Read a text file, decoding as UTF-8 and falling back to Latin-1.
pub fn read_text(path: &Path) -> anyhow::Result<String> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(decode(bytes))
}

fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            debug!(
                "input is not valid UTF-8 at byte {}, decoding as Latin-1",
                e.utf8_error().valid_up_to()
            );
            // Latin-1 maps every byte to the code point of the same value.
            e.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode("Total 4800,00 €".as_bytes().to_vec()), "Total 4800,00 €");
    }

    #[test]
    fn test_decode_latin1_fallback() {
        // "Téléphone" in Latin-1
        let bytes = b"T\xe9l\xe9phone".to_vec();
        assert_eq!(decode(bytes), "Téléphone");
    }
}
