use uuid::Uuid;

const MAX_NAME_LENGTH: usize = 63;
const RANDOM_LENGTH: usize = 5;
const MAX_GENERATED_NAME_LENGTH: usize = MAX_NAME_LENGTH - RANDOM_LENGTH;

/// No vowels and no look-alike characters, so generated suffixes never spell words.
const ALPHANUMS: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

pub trait NameGenerator: Send + Sync {
    /// Name derived from `base` (a `metadata.generateName`). Uniqueness is not
    /// guaranteed; the store's create rejects collisions.
    fn generate_name(&self, base: &str) -> String;
}

/// `base` plus five random characters, with `base` cut so the result fits in 63 characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleNameGenerator;

impl NameGenerator for SimpleNameGenerator {
    fn generate_name(&self, base: &str) -> String {
        let base: String = base.chars().take(MAX_GENERATED_NAME_LENGTH).collect();
        format!("{}{}", base, random_suffix())
    }
}

fn random_suffix() -> String {
    let seed = Uuid::new_v4();
    seed.as_bytes()[..RANDOM_LENGTH]
        .iter()
        .map(|b| ALPHANUMS[*b as usize % ALPHANUMS.len()] as char)
        .collect()
}
