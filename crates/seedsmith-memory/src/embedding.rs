/// Turns text into a fixed-size vector. Similar texts should land close together.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Vec<f32>;

    fn dims(&self) -> usize;
}

/// Feature-hashing embedder: no model, no network.
///
/// Hashes lowercase word unigrams, word bigrams and character trigrams into a
/// signed bucket vector, then L2-normalises it.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn bump(&self, v: &mut [f32], feature: &str, weight: f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();
        let mut idx = [0u8; 8];
        idx.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(idx) % self.dims as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(512)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
            .collect();

        for w in &words {
            self.bump(&mut v, &format!("w:{w}"), 1.0);
        }
        for pair in words.windows(2) {
            self.bump(&mut v, &format!("b:{} {}", pair[0], pair[1]), 0.5);
        }
        let chars: Vec<char> = lower.chars().filter(|c| !c.is_whitespace()).collect();
        for tri in chars.windows(3) {
            let t: String = tri.iter().collect();
            self.bump(&mut v, &format!("c:{t}"), 0.25);
        }
        // Punctuation-only snippets like "{}" yield no word or trigram.
        let trimmed = lower.trim();
        if !trimmed.is_empty() && v.iter().all(|x| *x == 0.0) {
            self.bump(&mut v, &format!("s:{trimmed}"), 1.0);
        }

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    fn dims(&self) -> usize {
        self.dims
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_similarity_one() {
        let e = HashingEmbedder::new(256);
        let a = e.embed("USER anonymous PASS guest");
        let b = e.embed("USER anonymous PASS guest");
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn related_text_beats_unrelated() {
        let e = HashingEmbedder::default();
        let q = e.embed("chunk header length field");
        let near = e.embed("the header of each chunk starts with a length field");
        let far = e.embed("zebra migration patterns in autumn");
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn short_punctuation_is_not_zero() {
        let e = HashingEmbedder::new(64);
        let a = e.embed("{}");
        assert!(a.iter().any(|x| *x != 0.0));
        assert!((cosine_similarity(&a, &e.embed(" {} ")) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(8);
        assert!(e.embed("   ").iter().all(|x| *x == 0.0));
        assert_eq!(cosine_similarity(&e.embed(""), &e.embed("x")), 0.0);
    }
}
