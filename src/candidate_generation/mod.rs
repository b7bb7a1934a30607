pub mod lsh;
pub mod signature;

pub use lsh::{generate_candidates, BandIndex};
pub use signature::{
    compute_signatures, extract_features, FeatureHashKind, FeatureHasher, Signature, SignatureConfig,
};
