//! Test-only crate. No runtime code lives here — see `tests/` for the
//! cross-crate scenarios exercised against the ingest, evaluator, and
//! notify crates.
