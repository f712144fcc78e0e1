//! Random search phrases for the house recommendation.

use rand::seq::IndexedRandom;
use rand::Rng;
use std::path::Path;

const BUILTIN_WORDS: &[&str] = &[
    "amber", "anchor", "angel", "apple", "arrow", "autumn", "baby", "ballad", "banana", "battle",
    "beach", "bell", "bird", "bitter", "black", "blue", "bone", "border", "bridge", "bright",
    "broken", "brother", "butterfly", "cactus", "candle", "canyon", "captain", "carnival",
    "castle", "champagne", "cherry", "circle", "city", "cloud", "coffee", "cold", "comet",
    "copper", "cowboy", "crystal", "dance", "dark", "dawn", "desert", "diamond", "dream",
    "drift", "dust", "echo", "electric", "ember", "empire", "evening", "faith", "feather",
    "fever", "field", "fire", "flower", "forest", "fortune", "freedom", "friend", "garden",
    "ghost", "glass", "gold", "gravity", "green", "harbor", "heart", "heaven", "highway",
    "holiday", "honey", "horizon", "hunter", "island", "ivory", "jungle", "kingdom", "lake",
    "letter", "light", "lightning", "lonely", "love", "lucky", "machine", "magic", "memory",
    "midnight", "mirror", "monday", "money", "moon", "morning", "mountain", "neon", "night",
    "ocean", "orange", "paper", "paradise", "party", "planet", "pocket", "power", "radio",
    "rain", "rebel", "river", "road", "rocket", "rose", "sailor", "satellite", "secret",
    "shadow", "silver", "sister", "sky", "smoke", "snow", "soul", "spring", "star", "stone",
    "storm", "street", "summer", "sun", "sunday", "sweet", "thunder", "tiger", "time",
    "train", "tropical", "velvet", "violet", "voice", "volcano", "wave", "weekend", "whiskey",
    "wild", "wind", "winter", "wolf", "yellow", "young",
];

/// A fixed dictionary to draw search phrases from
#[derive(Debug, Clone)]
pub struct Words {
    words: Vec<String>,
}

impl Default for Words {
    fn default() -> Self {
        Self::new(BUILTIN_WORDS.iter().map(|w| w.to_string()).collect())
    }
}

impl Words {
    pub fn new(words: Vec<String>) -> Self {
        Self { words }
    }

    /// Load one word per line, skipping blank lines. A file without any
    /// words is an error.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let words: Vec<String> = content
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if words.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("{} contains no words", path.display()),
            ));
        }
        tracing::info!("Loaded {} words from {}", words.len(), path.display());
        Ok(Self::new(words))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// A phrase of one or two distinct words
    pub fn random_phrase<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let count = rng.random_range(1..=2);
        self.phrase(rng, count)
    }

    /// `count` distinct words joined by spaces (fewer if the list is shorter)
    pub fn phrase<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> String {
        self.words
            .choose_multiple(rng, count)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}
