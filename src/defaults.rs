// src/defaults.rs
use crate::models::Character;

/// The built-in roster used when neither the backend nor the local cache
/// can provide one.
pub fn default_characters() -> Vec<Character> {
    [
        (
            "1",
            "Aria Vale",
            "The Songbird",
            "A wandering singer whose voice is said to calm storms.",
            "/images/aria.jpg",
            "#f472b6",
        ),
        (
            "2",
            "Kaito Ren",
            "The Strategist",
            "Reads every board three moves ahead and never raises his voice.",
            "/images/kaito.jpg",
            "#60a5fa",
        ),
        (
            "3",
            "Selene Marsh",
            "The Night Archivist",
            "Keeps the library open after dark for readers who cannot sleep.",
            "/images/selene.jpg",
            "#a78bfa",
        ),
        (
            "4",
            "Bram Holloway",
            "The Forgemaster",
            "Builds impossible machines out of scrap and stubbornness.",
            "/images/bram.jpg",
            "#f59e0b",
        ),
        (
            "5",
            "Nova Quinn",
            "The Stargazer",
            "Charts comets from a rooftop observatory she built herself.",
            "/images/nova.jpg",
            "#34d399",
        ),
    ]
    .into_iter()
    .map(|(id, name, role, description, image_url, theme_color)| Character {
        id: id.to_string(),
        name: name.to_string(),
        role: role.to_string(),
        description: description.to_string(),
        image_url: image_url.to_string(),
        votes: 0,
        theme_color: theme_color.to_string(),
    })
    .collect()
}
