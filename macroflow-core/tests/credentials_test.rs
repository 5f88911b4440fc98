//! Credential discovery against real files on disk.
//!
//! 1. Determinism: identical inputs resolve to the identical secret
//! 2. Literal/file asymmetry of the key-length rule
//! 3. Source precedence across env, `.env`, and fallback files

use macroflow_core::credentials::{
    normalize, project_root_from, CredentialError, CredentialResolver, CredentialSource,
    CredentialSpec,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

const KEY: &str = "abcdef0123456789abcdef0123456789";

fn no_env() -> HashMap<String, String> {
    HashMap::new()
}

fn resolver_in<'a>(
    dir: &TempDir,
    env: &'a HashMap<String, String>,
) -> CredentialResolver<'a> {
    CredentialResolver::new(CredentialSpec::FRED, env)
        .with_search_dirs(vec![dir.path().to_path_buf()])
}

// ── 1. Determinism ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn literal_resolution_is_deterministic(raw in "[A-Za-z0-9 _-]{1,64}") {
        prop_assume!(!raw.trim().is_empty());
        let env = no_env();
        let resolve = || {
            CredentialResolver::new(CredentialSpec::FRED, &env)
                .with_search_dirs(vec![])
                .with_key(Some(raw.clone()))
                .resolve()
        };
        let a = resolve();
        let b = resolve();
        prop_assert_eq!(&a, &b);
        if let Ok(cred) = a {
            prop_assert!(cred.expose().len() <= 32);
            prop_assert!(normalize(&raw).starts_with(cred.expose()));
        }
    }

    #[test]
    fn file_resolution_is_deterministic(key in "[a-z0-9]{32,40}") {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fred_api_key.txt"), format!("{key}\n")).unwrap();
        let env = no_env();
        let a = resolver_in(&dir, &env).resolve().unwrap();
        let b = resolver_in(&dir, &env).resolve().unwrap();
        prop_assert_eq!(a.expose(), b.expose());
        prop_assert_eq!(a.expose(), &key[..32]);
    }
}

// ── 2. Literal vs file asymmetry ─────────────────────────────────────

#[test]
fn short_key_in_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("fred_api_key.txt"), "tooshort123\n").unwrap();
    let env = no_env();

    let err = resolver_in(&dir, &env).resolve().unwrap_err();
    assert_eq!(
        err,
        CredentialError::Missing {
            name: "FRED_API_KEY".into()
        }
    );
}

#[test]
fn short_key_in_dotenv_is_rejected() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".env"), "FRED_API_KEY=tooshort123\n").unwrap();
    let env = no_env();
    assert!(resolver_in(&dir, &env).resolve().is_err());
}

#[test]
fn short_literal_key_is_accepted() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("fred_api_key.txt"), "tooshort123\n").unwrap();
    let env = no_env();

    let cred = resolver_in(&dir, &env)
        .with_key(Some("tooshort123".into()))
        .resolve()
        .unwrap();
    assert_eq!(cred.expose(), "tooshort123");
    assert_eq!(cred.source(), &CredentialSource::Literal);
}

#[test]
fn blank_literal_falls_through() {
    let dir = TempDir::new().unwrap();
    let env: HashMap<String, String> = [("FRED_API_KEY".to_string(), KEY.to_string())].into();
    let cred = resolver_in(&dir, &env)
        .with_key(Some("   ".into()))
        .resolve()
        .unwrap();
    assert_eq!(
        cred.source(),
        &CredentialSource::Environment("FRED_API_KEY".into())
    );
}

// ── 3. Precedence ────────────────────────────────────────────────────

#[test]
fn explicit_key_file_beats_environment() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("mykey.txt");
    fs::write(&file, format!("# comment=x\nkey = '{}'\n", KEY.to_uppercase())).unwrap();
    let env: HashMap<String, String> =
        [("FRED_API_KEY".to_string(), "from-env".to_string())].into();

    let cred = resolver_in(&dir, &env)
        .with_key_file(Some(file.clone()))
        .resolve()
        .unwrap();
    assert_eq!(cred.expose(), KEY);
    assert_eq!(cred.source(), &CredentialSource::KeyFile(file));
}

#[test]
fn missing_explicit_key_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    let env: HashMap<String, String> =
        [("FRED_API_KEY".to_string(), "\"quoted\"".to_string())].into();

    let cred = resolver_in(&dir, &env)
        .with_key_file(Some(dir.path().join("nope.txt")))
        .resolve()
        .unwrap();
    assert_eq!(cred.expose(), "quoted");
}

#[test]
fn dotenv_key_match_ignores_case_and_punctuation() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".env"),
        format!("OTHER=1\nFredApiKey={KEY}\n"),
    )
    .unwrap();
    let env = no_env();

    let cred = resolver_in(&dir, &env).resolve().unwrap();
    assert_eq!(cred.expose(), KEY);
    assert!(matches!(cred.source(), CredentialSource::DotEnv(_)));
}

#[test]
fn dotenv_keys_outside_dotenv_grammar_still_match() {
    for line in [
        format!("FRED-API-KEY={KEY}"),
        format!("fred api key = {KEY}"),
        format!("FRED_API_KEY = {KEY}"),
    ] {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), format!("# keys\nOTHER=1\n{line}\n")).unwrap();
        let env = no_env();

        let cred = resolver_in(&dir, &env)
            .resolve()
            .unwrap_or_else(|e| panic!("{line:?}: {e}"));
        assert_eq!(cred.expose(), KEY, "{line:?}");
        assert!(matches!(cred.source(), CredentialSource::DotEnv(_)));
    }
}

#[test]
fn dotenv_fallback_line_still_needs_full_length() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".env"), "FRED-API-KEY=tooshort\n").unwrap();
    let env = no_env();
    assert!(resolver_in(&dir, &env).resolve().is_err());
}

#[test]
fn project_root_is_nearest_cargo_manifest_above_binary() {
    let dir = TempDir::new().unwrap();
    let bin = dir.path().join("target").join("release");
    fs::create_dir_all(&bin).unwrap();
    fs::write(dir.path().join("Cargo.toml"), "[workspace]\n").unwrap();

    let root = project_root_from(&bin.join("macroflow")).unwrap();
    assert_eq!(root, dir.path());
}

#[test]
fn project_root_without_manifest_is_binary_parent() {
    let dir = TempDir::new().unwrap();
    let bin = dir.path().join("prefix").join("bin");
    fs::create_dir_all(&bin).unwrap();

    let root = project_root_from(&bin.join("macroflow")).unwrap();
    assert_eq!(root, dir.path().join("prefix"));
}

#[test]
fn dotenv_beats_fallback_files() {
    let dir = TempDir::new().unwrap();
    let other = "ffffffffffffffffffffffffffffffff";
    fs::write(dir.path().join(".env"), format!("FRED_API_KEY={KEY}\n")).unwrap();
    fs::write(dir.path().join("fred_api_key.txt"), other).unwrap();
    let env = no_env();

    assert_eq!(resolver_in(&dir, &env).resolve().unwrap().expose(), KEY);
}

#[test]
fn override_path_beats_secrets_dir() {
    let dir = TempDir::new().unwrap();
    let override_file = dir.path().join("elsewhere.txt");
    let secrets = dir.path().join("secrets");
    fs::create_dir_all(&secrets).unwrap();
    fs::write(&override_file, KEY).unwrap();
    fs::write(
        secrets.join("fred_api_key.txt"),
        "ffffffffffffffffffffffffffffffff",
    )
    .unwrap();
    let env: HashMap<String, String> = [(
        "FRED_API_KEY_FILE".to_string(),
        override_file.display().to_string(),
    )]
    .into();

    let cred = resolver_in(&dir, &env).resolve().unwrap();
    assert_eq!(cred.expose(), KEY);
    assert_eq!(cred.source(), &CredentialSource::FallbackFile(override_file));
}

#[test]
fn second_search_dir_is_consulted() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    fs::write(second.path().join("fred_api_key.txt"), KEY).unwrap();
    let env = no_env();

    let cred = CredentialResolver::new(CredentialSpec::FRED, &env)
        .with_search_dirs(vec![first.path().to_path_buf(), second.path().to_path_buf()])
        .resolve()
        .unwrap();
    assert_eq!(cred.expose(), KEY);
}

#[test]
fn tushare_requires_longer_token_from_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tushare_token.txt"), KEY).unwrap();
    let env = no_env();

    let resolver = CredentialResolver::new(CredentialSpec::TUSHARE, &env)
        .with_search_dirs(vec![dir.path().to_path_buf()]);
    assert!(resolver.resolve().is_err());

    let token = "a".repeat(56);
    fs::write(dir.path().join("tushare_token.txt"), &token).unwrap();
    assert_eq!(resolver.resolve().unwrap().expose(), token);
}
