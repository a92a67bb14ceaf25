//! # Digest Subcommands
//!
//! `hash`, `verify` and `canonical` read a JSON file holding proposal
//! content (`title`, `body`, `financialSnapshot`) and run it through the
//! same canonicalization and SHA-256 path the API uses at signing time.
//! A document exported from `GET /v1/documents/{id}` works as input too:
//! the extra fields are ignored for hashing, and its `documentHash` is the
//! default expectation for `verify`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use proposal_core::{CanonicalBytes, ContentDigest};
use proposal_state::{verify_content_hash, DocumentContent, LifecycleError};

/// Exit code when the content does not match the expected hash.
pub const EXIT_MISMATCH: u8 = 2;

#[derive(Args, Debug)]
pub struct HashArgs {
    /// JSON file with the document content.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// JSON file with the document content.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    /// Expected SHA-256 hex digest. Defaults to the file's `documentHash`.
    #[arg(long, value_name = "HEX")]
    pub expected: Option<String>,
}

#[derive(Args, Debug)]
pub struct CanonicalArgs {
    /// JSON file with the document content.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

struct Loaded {
    content: DocumentContent,
    raw: serde_json::Value,
}

fn load(path: &Path) -> Result<Loaded> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let content: DocumentContent = serde_json::from_value(raw.clone())
        .with_context(|| format!("{} does not hold proposal content", path.display()))?;
    tracing::debug!(file = %path.display(), title = %content.title, "loaded content");
    Ok(Loaded { content, raw })
}

/// Print the canonical content hash.
pub fn run_hash(args: &HashArgs, out: &mut impl Write) -> Result<u8> {
    let loaded = load(&args.file)?;
    let digest = loaded.content.digest().context("canonicalization failed")?;
    writeln!(out, "{digest}")?;
    Ok(0)
}

/// Compare the content hash with an expected digest.
pub fn run_verify(args: &VerifyArgs, out: &mut impl Write) -> Result<u8> {
    let loaded = load(&args.file)?;
    let expected_hex = match (&args.expected, loaded.raw.get("documentHash")) {
        (Some(hex), _) => hex.clone(),
        (None, Some(serde_json::Value::String(hex))) => hex.clone(),
        (None, _) => bail!(
            "no expected hash: pass --expected or export a signed document with documentHash"
        ),
    };
    let expected = ContentDigest::from_hex(&expected_hex)
        .with_context(|| format!("invalid expected digest '{expected_hex}'"))?;

    match verify_content_hash(&loaded.content, &expected) {
        Ok(digest) => {
            writeln!(out, "OK {digest}")?;
            Ok(0)
        }
        Err(LifecycleError::Integrity(violation)) => {
            tracing::error!(file = %args.file.display(), "integrity violation");
            writeln!(out, "{violation}")?;
            Ok(EXIT_MISMATCH)
        }
        Err(other) => Err(other.into()),
    }
}

/// Print the canonical (JCS) bytes that get hashed.
pub fn run_canonical(args: &CanonicalArgs, out: &mut impl Write) -> Result<u8> {
    let loaded = load(&args.file)?;
    let canonical = CanonicalBytes::new(&loaded.content).context("canonicalization failed")?;
    let text = canonical
        .as_str()
        .context("canonical bytes are not UTF-8")?;
    writeln!(out, "{text}")?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_json(dir: &tempfile::TempDir, name: &str, value: &serde_json::Value) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, value.to_string()).unwrap();
        path
    }

    fn content() -> serde_json::Value {
        serde_json::json!({
            "title": "Stadium Display",
            "body": {"scope": {"screens": 2}, "terms": ["net 30"]},
            "financialSnapshot": {"total": "250000.00"}
        })
    }

    fn expected_digest() -> ContentDigest {
        serde_json::from_value::<DocumentContent>(content())
            .unwrap()
            .digest()
            .unwrap()
    }

    #[test]
    fn hash_prints_the_content_digest() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_json(&dir, "content.json", &content());
        let mut out = Vec::new();
        assert_eq!(run_hash(&HashArgs { file }, &mut out).unwrap(), 0);
        assert_eq!(
            String::from_utf8(out).unwrap().trim(),
            expected_digest().to_hex()
        );
    }

    #[test]
    fn hash_ignores_key_order_and_export_fields() {
        let dir = tempfile::tempdir().unwrap();
        let reordered = serde_json::json!({
            "financialSnapshot": {"total": "250000.00"},
            "status": "SIGNED",
            "body": {"terms": ["net 30"], "scope": {"screens": 2}},
            "title": "Stadium Display"
        });
        let file = write_json(&dir, "export.json", &reordered);
        let mut out = Vec::new();
        run_hash(&HashArgs { file }, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap().trim(),
            expected_digest().to_hex()
        );
    }

    #[test]
    fn verify_matches_expected() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_json(&dir, "content.json", &content());
        let mut out = Vec::new();
        let code = run_verify(
            &VerifyArgs {
                file,
                expected: Some(expected_digest().to_hex()),
            },
            &mut out,
        )
        .unwrap();
        assert_eq!(code, 0);
        assert!(String::from_utf8(out).unwrap().starts_with("OK "));
    }

    #[test]
    fn verify_reports_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let mut exported = content();
        exported["documentHash"] = serde_json::json!(expected_digest().to_hex());
        exported["body"]["scope"]["screens"] = serde_json::json!(3);
        let file = write_json(&dir, "tampered.json", &exported);

        let mut out = Vec::new();
        let code = run_verify(&VerifyArgs { file, expected: None }, &mut out).unwrap();
        assert_eq!(code, EXIT_MISMATCH);
        assert!(String::from_utf8(out).unwrap().contains("integrity violation"));
    }

    #[test]
    fn verify_without_expectation_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_json(&dir, "content.json", &content());
        let mut out = Vec::new();
        assert!(run_verify(&VerifyArgs { file, expected: None }, &mut out).is_err());
    }

    #[test]
    fn canonical_output_is_sorted_and_compact() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_json(
            &dir,
            "content.json",
            &serde_json::json!({"title": "T", "body": {"b": 1, "a": 2}}),
        );
        let mut out = Vec::new();
        run_canonical(&CanonicalArgs { file }, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap().trim(),
            r#"{"body":{"a":2,"b":1},"financialSnapshot":null,"title":"T"}"#
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut out = Vec::new();
        let err = run_hash(
            &HashArgs {
                file: PathBuf::from("/nonexistent/content.json"),
            },
            &mut out,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("failed to read"));
    }
}
