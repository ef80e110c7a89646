/*!
 * Text processing: normalization, number expansion and tokenization.
 */

pub mod normalizer;
pub mod numbers;

pub use normalizer::{
    NormalizationConfig, NormalizedScript, Normalizer, NumberFormat, Token, TokenKind, tokenize,
};
