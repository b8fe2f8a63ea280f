use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{Result, TokenizerError};
use crate::vocab::Vocab;

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";
pub const BOS_TOKEN: &str = "<s>";
pub const EOS_TOKEN: &str = "</s>";

pub(crate) const PRE_TOKENIZE_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+";

fn default_regex() -> Regex {
    Regex::new(PRE_TOKENIZE_PATTERN).expect("pre-tokenizer pattern is valid")
}

/// Ids of the reserved tokens every trained vocabulary starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub pad: u32,
    pub unk: u32,
    pub bos: u32,
    pub eos: u32,
}

impl SpecialTokens {
    pub const NAMES: [&'static str; 4] = [PAD_TOKEN, UNK_TOKEN, BOS_TOKEN, EOS_TOKEN];
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BPE {
    pub vocab: Vocab,
    /// Merge rules in priority order; earlier rules are applied first.
    pub merges: Vec<(String, String)>,
    #[serde(skip)]
    ranks: HashMap<(String, String), u32>,
    #[serde(skip, default = "default_regex")]
    regex: Regex,
}

// Custom Debug impl to skip regex
impl std::fmt::Debug for BPE {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BPE")
            .field("vocab_size", &self.vocab.len())
            .field("merges_count", &self.merges.len())
            .finish()
    }
}

impl BPE {
    pub fn new(vocab: Vocab, merges: Vec<(String, String)>) -> Self {
        let ranks = Self::rank_merges(&merges);
        Self {
            vocab,
            merges,
            ranks,
            regex: default_regex(),
        }
    }

    fn rank_merges(merges: &[(String, String)]) -> HashMap<(String, String), u32> {
        merges
            .iter()
            .enumerate()
            .map(|(rank, pair)| (pair.clone(), rank as u32))
            .collect()
    }

    pub fn special_tokens(&self) -> Result<SpecialTokens> {
        let id = |name: &str| {
            self.vocab
                .get_id(name)
                .ok_or_else(|| TokenizerError::MissingSpecialToken(name.to_string()))
        };
        Ok(SpecialTokens {
            pad: id(PAD_TOKEN)?,
            unk: id(UNK_TOKEN)?,
            bos: id(BOS_TOKEN)?,
            eos: id(EOS_TOKEN)?,
        })
    }

    fn get_pairs(word: &[String]) -> HashSet<(String, String)> {
        word.windows(2)
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect()
    }

    fn bpe(&self, token: &str) -> Vec<String> {
        let mut word: Vec<String> = token.chars().map(|c| c.to_string()).collect();

        while word.len() > 1 {
            let best_pair = Self::get_pairs(&word)
                .into_iter()
                .filter_map(|pair| self.ranks.get(&pair).map(|&rank| (rank, pair)))
                .min_by_key(|(rank, _)| *rank);

            let Some((_, (first, second))) = best_pair else {
                break;
            };

            let mut new_word = Vec::with_capacity(word.len());
            let mut i = 0;
            while i < word.len() {
                if i + 1 < word.len() && word[i] == first && word[i + 1] == second {
                    new_word.push(format!("{}{}", first, second));
                    i += 2;
                } else {
                    new_word.push(word[i].clone());
                    i += 1;
                }
            }
            word = new_word;
        }

        word
    }

    pub fn encode(&self, text: &str) -> Vec<u32> {
        let unk = self.vocab.get_id(UNK_TOKEN);
        let mut ids = Vec::new();
        for mat in self.regex.find_iter(text) {
            for token in self.bpe(mat.as_str()) {
                if let Some(id) = self.vocab.get_id(&token) {
                    ids.push(id);
                    continue;
                }
                // Fallback: encode as bytes
                for byte in token.bytes() {
                    let s = format!("<0x{:02X}>", byte);
                    if let Some(id) = self.vocab.get_id(&s).or(unk) {
                        ids.push(id);
                    }
                }
            }
        }
        ids
    }

    /// Encodes `text`, keeping at most the first `max_tokens` ids.
    pub fn encode_with_max_tokens(&self, text: &str, max_tokens: usize) -> Vec<u32> {
        let mut ids = self.encode(text);
        ids.truncate(max_tokens);
        ids
    }

    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter()
            .filter_map(|id| self.vocab.get_token(*id))
            .map(String::as_str)
            .collect()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut bpe: BPE = serde_json::from_reader(reader)?;
        bpe.vocab.rebuild_index();
        bpe.ranks = Self::rank_merges(&bpe.merges);
        Ok(bpe)
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}
