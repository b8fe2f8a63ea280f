use rayon::prelude::*;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

use crate::bpe::{PRE_TOKENIZE_PATTERN, BPE};
use crate::error::{Result, TokenizerError};
use crate::vocab::Vocab;

type Pair = (String, String);

/// Learns a byte-pair vocabulary from raw text.
///
/// Training is deterministic: the most frequent pair wins and ties go to the
/// lexicographically smallest pair, so the same corpus always yields the same
/// tokenizer.
pub struct Trainer {
    vocab_size: usize,
    min_frequency: u32,
    special_tokens: Vec<String>,
}

impl Trainer {
    pub fn new(vocab_size: usize, min_frequency: u32, special_tokens: Vec<String>) -> Self {
        Self {
            vocab_size,
            min_frequency,
            special_tokens,
        }
    }

    /// Trains on `texts`, one document per item.
    pub fn train_from_texts<'a, I>(&self, texts: I) -> Result<BPE>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let regex = Regex::new(PRE_TOKENIZE_PATTERN)?;

        let mut word_counts: HashMap<String, u32> = HashMap::new();
        for text in texts {
            for mat in regex.find_iter(text) {
                *word_counts.entry(mat.as_str().to_string()).or_insert(0) += 1;
            }
        }
        if word_counts.is_empty() {
            return Err(TokenizerError::EmptyCorpus);
        }
        log::info!("Unique words: {}", word_counts.len());

        let mut words: Vec<(Vec<String>, u32)> = word_counts
            .into_iter()
            .map(|(word, count)| (word.chars().map(|c| c.to_string()).collect(), count))
            .collect();

        let mut vocab = Vocab::new();
        for token in &self.special_tokens {
            vocab.push(token);
        }

        let base_chars: BTreeSet<&String> = words.iter().flat_map(|(chars, _)| chars).collect();
        for c in base_chars {
            vocab.push(c);
        }

        // Byte fallback tokens (<0x00> to <0xFF>)
        for i in 0..=255u8 {
            vocab.push(&format!("<0x{:02X}>", i));
        }
        log::info!("Initial vocab size: {}", vocab.len());

        let mut merges: Vec<Pair> = Vec::new();
        while vocab.len() < self.vocab_size {
            let Some((first, second)) = self.best_pair(&words) else {
                log::info!("No more pairs to merge. Stopping.");
                break;
            };

            let new_token = format!("{}{}", first, second);
            vocab.push(&new_token);

            words.par_iter_mut().for_each(|(tokens, _)| {
                if tokens.len() < 2 {
                    return;
                }
                let mut merged = Vec::with_capacity(tokens.len());
                let mut i = 0;
                while i < tokens.len() {
                    if i + 1 < tokens.len() && tokens[i] == first && tokens[i + 1] == second {
                        merged.push(new_token.clone());
                        i += 2;
                    } else {
                        merged.push(tokens[i].clone());
                        i += 1;
                    }
                }
                *tokens = merged;
            });
            merges.push((first, second));

            if vocab.len() % 100 == 0 {
                log::debug!("Vocab size: {}", vocab.len());
            }
        }

        Ok(BPE::new(vocab, merges))
    }

    fn best_pair(&self, words: &[(Vec<String>, u32)]) -> Option<Pair> {
        let pair_counts = words
            .par_iter()
            .fold(HashMap::<Pair, u32>::new, |mut acc, (tokens, count)| {
                for w in tokens.windows(2) {
                    *acc.entry((w[0].clone(), w[1].clone())).or_insert(0) += count;
                }
                acc
            })
            .reduce(HashMap::new, |mut a, b| {
                for (pair, count) in b {
                    *a.entry(pair).or_insert(0) += count;
                }
                a
            });

        pair_counts
            .into_iter()
            .filter(|(_, count)| *count >= self.min_frequency)
            .max_by(|(pa, ca), (pb, cb)| ca.cmp(cb).then_with(|| pb.cmp(pa)))
            .map(|(pair, _)| pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bpe::SpecialTokens;

    fn specials() -> Vec<String> {
        SpecialTokens::NAMES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn special_tokens_take_the_first_ids() {
        let bpe = Trainer::new(300, 1, specials())
            .train_from_texts(["hello world"])
            .unwrap();
        let special = bpe.special_tokens().unwrap();
        assert_eq!((special.pad, special.unk, special.bos, special.eos), (0, 1, 2, 3));
    }

    #[test]
    fn frequent_pairs_become_tokens() {
        let texts = ["the the the", "then the"];
        let bpe = Trainer::new(290, 1, specials())
            .train_from_texts(texts)
            .unwrap();
        // "th" and "he" tie at five occurrences; the smaller pair wins
        assert_eq!(bpe.merges[0], ("h".to_string(), "e".to_string()));
        assert!(bpe.vocab.get_id("the").is_some());
    }

    #[test]
    fn training_is_deterministic() {
        let texts = ["guten tag", "bonjour tout le monde", "buenos dias", "hyvää päivää"];
        let a = Trainer::new(320, 1, specials()).train_from_texts(texts).unwrap();
        let b = Trainer::new(320, 1, specials()).train_from_texts(texts).unwrap();
        assert_eq!(a.merges, b.merges);
        assert_eq!(a.vocab.token_to_id, b.vocab.token_to_id);
    }

    #[test]
    fn min_frequency_stops_merging() {
        let bpe = Trainer::new(10_000, 5, specials())
            .train_from_texts(["abc"])
            .unwrap();
        assert!(bpe.merges.is_empty());
    }

    #[test]
    fn empty_corpus_is_rejected() {
        let result = Trainer::new(300, 1, specials()).train_from_texts(std::iter::empty::<&str>());
        assert!(matches!(result, Err(TokenizerError::EmptyCorpus)));
    }
}
