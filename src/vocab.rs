//! Token vocabulary
//!
//! Maps surface tokens to the integer ids fed to the encoder's embedding
//! table, and back. Four special tokens always occupy the first ids:
//!
//! | Token | Id |
//! |-------|----|
//! | `<pad>` | 0 |
//! | `<unk>` | 1 |
//! | `<sos>` | 2 |
//! | `<eos>` | 3 |

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EncoderError, Result};

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const SOS_TOKEN: &str = "<sos>";
pub const EOS_TOKEN: &str = "<eos>";

const SPECIAL_TOKENS: [&str; 4] = [PAD_TOKEN, UNK_TOKEN, SOS_TOKEN, EOS_TOKEN];

/// Bidirectional token/id mapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vocabulary {
    tokens: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocabulary {
    /// Create a vocabulary holding only the special tokens
    pub fn new() -> Self {
        let mut vocab = Self {
            tokens: Vec::new(),
            index: HashMap::new(),
        };
        for token in SPECIAL_TOKENS {
            vocab.add_token(token);
        }
        vocab
    }

    /// Create a vocabulary from a token stream, in first-seen order
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::new();
        for token in tokens {
            vocab.add_token(token.as_ref());
        }
        vocab
    }

    /// Insert a token if missing and return its id
    pub fn add_token(&mut self, token: &str) -> usize {
        if let Some(&id) = self.index.get(token) {
            return id;
        }
        let id = self.tokens.len();
        self.tokens.push(token.to_string());
        self.index.insert(token.to_string(), id);
        id
    }

    /// Id of `token`, or the `<unk>` id when unknown
    pub fn id(&self, token: &str) -> usize {
        self.index.get(token).copied().unwrap_or(self.unk_id())
    }

    pub fn token(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    /// Number of entries, special tokens included
    pub fn vocab_size(&self) -> usize {
        self.tokens.len()
    }

    pub fn pad_id(&self) -> usize {
        0
    }

    pub fn unk_id(&self) -> usize {
        1
    }

    pub fn sos_id(&self) -> usize {
        2
    }

    pub fn eos_id(&self) -> usize {
        3
    }

    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        tokens.iter().map(|t| self.id(t.as_ref())).collect()
    }

    /// Map ids back to tokens; unknown ids decode as `<unk>`
    pub fn decode(&self, ids: &[usize]) -> Vec<String> {
        ids.iter()
            .map(|&id| self.token(id).unwrap_or(UNK_TOKEN).to_string())
            .collect()
    }

    /// Write the vocabulary as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        tracing::debug!(
            "Saved vocabulary of {} tokens to '{}'",
            self.vocab_size(),
            path.display()
        );
        Ok(())
    }

    /// Read a vocabulary written by [`Vocabulary::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let mut vocab: Vocabulary = serde_json::from_str(&json)?;
        vocab.rebuild_index()?;
        Ok(vocab)
    }

    fn rebuild_index(&mut self) -> Result<()> {
        for (id, special) in SPECIAL_TOKENS.iter().enumerate() {
            if self.tokens.get(id).map(String::as_str) != Some(*special) {
                return Err(EncoderError::Vocabulary(format!(
                    "expected '{}' at id {}",
                    special, id
                )));
            }
        }
        self.index.clear();
        for (id, token) in self.tokens.iter().enumerate() {
            if self.index.insert(token.clone(), id).is_some() {
                return Err(EncoderError::Vocabulary(format!(
                    "duplicate token '{}'",
                    token
                )));
            }
        }
        Ok(())
    }
}
