//! Shared helpers for the end-to-end scenario suite live under `tests/`.
