//! Cross-crate scenario tests live under `tests/`.
