use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::llm::Provider;
use crate::state::{ensure_slotwise_home, write_atomic};

/// Overrides whatever is stored in auth.json, for every provider.
pub const API_KEY_ENV: &str = "SLOTWISE_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AuthState {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

impl AuthState {
    pub fn key_for(&self, provider: Provider) -> Option<&str> {
        let key = match provider {
            Provider::Gemini => &self.gemini_api_key,
            Provider::OpenAI => &self.openai_api_key,
            Provider::Anthropic => &self.anthropic_api_key,
        };
        key.as_deref().filter(|k| !k.trim().is_empty())
    }

    pub fn set_key(&mut self, provider: Provider, key: String) {
        let slot = match provider {
            Provider::Gemini => &mut self.gemini_api_key,
            Provider::OpenAI => &mut self.openai_api_key,
            Provider::Anthropic => &mut self.anthropic_api_key,
        };
        *slot = Some(key);
    }
}

fn auth_path() -> Result<PathBuf> {
    Ok(ensure_slotwise_home()?.join("auth.json"))
}

pub fn load_auth() -> Result<AuthState> {
    load_auth_from(&auth_path()?)
}

pub fn load_auth_from(p: &Path) -> Result<AuthState> {
    if !p.exists() {
        return Ok(AuthState::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_auth(auth: &AuthState) -> Result<()> {
    write_atomic(&auth_path()?, &serde_json::to_string_pretty(auth)?)
}

/// API key for `provider`: `$SLOTWISE_API_KEY` first, then auth.json.
pub fn resolve_api_key(provider: Provider) -> Result<Option<String>> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            return Ok(Some(key.trim().to_string()));
        }
    }
    Ok(load_auth()?.key_for(provider).map(str::to_string))
}

fn prompt_secret(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

pub fn paste_api_key(provider: Provider) -> Result<()> {
    let mut auth = load_auth()?;
    let key = prompt_secret(&format!("Paste {} API key", provider.label()))?;
    check_key_shape(provider, &key)?;
    auth.set_key(provider, key);
    save_auth(&auth)?;
    println!("Saved {} API key to {}", provider.label(), auth_path()?.display());
    Ok(())
}

fn check_key_shape(provider: Provider, key: &str) -> Result<()> {
    if key.is_empty() {
        bail!("no key entered");
    }
    match provider {
        Provider::Anthropic if !key.starts_with("sk-ant-") => {
            bail!("key didn't look like an Anthropic key (expected prefix sk-ant-)")
        }
        Provider::OpenAI if !key.starts_with("sk-") => {
            bail!("key didn't look like an OpenAI API key (expected prefix sk-)")
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn keys_are_per_provider() {
        let mut auth = AuthState::default();
        auth.set_key(Provider::Gemini, "AIza-test".to_string());
        auth.set_key(Provider::OpenAI, "   ".to_string());

        assert_eq!(auth.key_for(Provider::Gemini), Some("AIza-test"));
        assert_eq!(auth.key_for(Provider::OpenAI), None);
        assert_eq!(auth.key_for(Provider::Anthropic), None);
    }

    #[test]
    fn key_shape_checks() {
        assert!(check_key_shape(Provider::Anthropic, "sk-ant-abc").is_ok());
        assert!(check_key_shape(Provider::Anthropic, "sk-abc").is_err());
        assert!(check_key_shape(Provider::OpenAI, "abc").is_err());
        assert!(check_key_shape(Provider::Gemini, "AIza-anything").is_ok());
        assert!(check_key_shape(Provider::Gemini, "").is_err());
    }

    #[test]
    fn auth_file_round_trips() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join("auth.json");
        assert_eq!(load_auth_from(&p).unwrap(), AuthState::default());

        let mut auth = AuthState::default();
        auth.set_key(Provider::Anthropic, "sk-ant-1".to_string());
        write_atomic(&p, &serde_json::to_string_pretty(&auth).unwrap()).unwrap();
        assert_eq!(load_auth_from(&p).unwrap(), auth);
    }
}
