use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};
use sha2::{
    Digest,
    Sha256,
};

/// RNG seed derived from a user phrase, with the digest that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPhrase {
    pub seed: u64,
    pub digest: String,
}

impl SeedPhrase {
    pub fn derive(phrase: &str) -> Self {
        let digest: [u8; 32] = Sha256::digest(phrase.as_bytes()).into();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Self {
            seed: u64::from_le_bytes(head),
            digest: hex::encode(digest),
        }
    }

    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }
}

/// Seeded RNG for `phrase`, or a fresh entropy-seeded one. Returns the seed used.
pub fn session_rng(phrase: Option<&str>) -> (StdRng, u64) {
    match phrase {
        Some(phrase) => {
            let seed = SeedPhrase::derive(phrase);
            tracing::info!(digest = %seed.digest, "using seeded RNG");
            (seed.rng(), seed.seed)
        }
        None => {
            let seed = rand::rng().random();
            (StdRng::seed_from_u64(seed), seed)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use lootcase_core::RandomSource;

    #[test]
    fn derive__is_stable_for_the_same_phrase() {
        let a = SeedPhrase::derive("lucky crown");
        let b = SeedPhrase::derive("lucky crown");

        assert_eq!(a, b);
        assert_eq!(a.digest.len(), 64);
        assert_ne!(a.seed, SeedPhrase::derive("unlucky crown").seed);
    }

    #[test]
    fn derive__uses_sha256_of_the_phrase() {
        let seed = SeedPhrase::derive("abc");

        assert_eq!(
            seed.digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            seed.seed,
            u64::from_le_bytes([0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea])
        );
    }

    #[test]
    fn session_rng__same_phrase_replays_the_same_draws() {
        let (mut first, seed_a) = session_rng(Some("replay"));
        let (mut second, seed_b) = session_rng(Some("replay"));

        assert_eq!(seed_a, seed_b);
        for _ in 0..10 {
            assert_eq!(first.next_unit(), second.next_unit());
        }
    }
}
