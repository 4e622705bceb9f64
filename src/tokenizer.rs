//! Tokenizer adapter: text ↔ token ids, plus token counting.
//!
//! Every token count in the pipeline — chunk windows, budget
//! arithmetic, truncation — goes through one shared [`Tokenizer`], so
//! size guarantees hold end to end. Mixing tokenizers breaks them.
//!
//! The production implementation wraps a Hugging Face `tokenizer.json`
//! fetched into a local cache. When the named model's tokenizer cannot
//! be loaded, a byte-level encoding is substituted with a warning; the
//! pipeline behaves identically apart from tokenization granularity.

use std::path::PathBuf;

/// Text ↔ token-id conversion for one fixed encoding scheme.
///
/// `decode(encode(x))` reproduces `x` exactly for plain printable text.
/// It is not guaranteed for adversarial byte sequences under model
/// tokenizers; the byte-level fallback round-trips all valid UTF-8.
pub trait Tokenizer: Send + Sync {
    /// Convert text to a token-id sequence.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Convert a token-id sequence back to text.
    fn decode(&self, ids: &[u32]) -> String;

    /// Number of tokens in `text`. `count("") == 0`.
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            0
        } else {
            self.encode(text).len()
        }
    }
}

/// Byte-level encoding: one token per UTF-8 byte.
///
/// Deterministic, dependency-free, and exactly round-tripping, which
/// makes it both the offline fallback scheme and the tokenizer used
/// throughout the test suite.
pub struct ByteTokenizer;

impl Tokenizer for ByteTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.bytes().map(u32::from).collect()
    }

    fn decode(&self, ids: &[u32]) -> String {
        // A token-level truncation can split a multi-byte character;
        // lossy decoding replaces the dangling bytes.
        let bytes: Vec<u8> = ids.iter().map(|&id| id as u8).collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Adapter over a Hugging Face `tokenizer.json`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Load tokenizer {}: {}", path.display(), e))?;
        Ok(Self { inner })
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        // Special tokens are omitted so decode reassembles plain text.
        self.inner
            .encode(text, false)
            .map(|enc| enc.get_ids().to_vec())
            .unwrap_or_default()
    }

    fn decode(&self, ids: &[u32]) -> String {
        self.inner.decode(ids, true).unwrap_or_default()
    }
}

fn cache_dir() -> anyhow::Result<PathBuf> {
    let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let dir = PathBuf::from(base)
        .join(".cache")
        .join("docqa")
        .join("tokenizers");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

async fn ensure_cached(model_repo: &str) -> anyhow::Result<PathBuf> {
    let cache_path = cache_dir()?
        .join(model_repo.replace('/', "--"))
        .join("tokenizer.json");
    if cache_path.exists() {
        return Ok(cache_path);
    }

    let url = format!(
        "https://huggingface.co/{}/resolve/main/tokenizer.json",
        model_repo
    );
    let resp = reqwest::get(&url)
        .await
        .map_err(|e| anyhow::anyhow!("Download {}: {}", url, e))?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download {}: {}", url, e))?;
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| anyhow::anyhow!("Read body: {}", e))?;

    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&cache_path, &bytes)?;
    Ok(cache_path)
}

/// Load the tokenizer for `model_repo`, falling back to the byte-level
/// scheme when the model's tokenizer is unavailable. The substitution
/// is logged as a non-fatal warning.
pub async fn load(model_repo: &str) -> Box<dyn Tokenizer> {
    match ensure_cached(model_repo).await {
        Ok(path) => match HfTokenizer::from_file(&path) {
            Ok(tok) => return Box::new(tok),
            Err(e) => {
                eprintln!(
                    "Warning: tokenizer for {} unusable ({}), using byte-level fallback",
                    model_repo, e
                );
            }
        },
        Err(e) => {
            eprintln!(
                "Warning: tokenizer for {} unavailable ({}), using byte-level fallback",
                model_repo, e
            );
        }
    }
    Box::new(ByteTokenizer)
}
