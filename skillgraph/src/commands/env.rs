//! `skillgraph env ...`: environment bundles. Secret values are never printed.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::context::AppContext;

/// Parse repeated `KEY=VALUE` arguments. Later duplicates win.
pub fn parse_vars(raw: &[String]) -> Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();
    for item in raw {
        let Some((key, value)) = item.split_once('=') else {
            bail!("Invalid --var '{}': expected KEY=VALUE", item);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid --var '{}': empty key", item);
        }
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

pub fn cmd_create(ctx: &AppContext, name: &str, description: &str, vars: &[String]) -> Result<()> {
    let vars = parse_vars(vars)?;
    let view = ctx.bundles().create(name, description, &vars)?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

pub fn cmd_show(ctx: &AppContext, name: &str) -> Result<()> {
    let view = ctx.bundles().read(name)?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

pub fn cmd_keys(ctx: &AppContext, name: &str) -> Result<()> {
    let keys = ctx.bundles().list_keys(name)?;
    println!("{}", serde_json::to_string_pretty(&keys)?);
    Ok(())
}

pub fn cmd_update(ctx: &AppContext, name: &str, description: Option<&str>, vars: &[String]) -> Result<()> {
    let vars = if vars.is_empty() {
        None
    } else {
        Some(parse_vars(vars)?)
    };
    let view = ctx.bundles().update(name, description, vars.as_ref())?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

pub fn cmd_delete(ctx: &AppContext, name: &str) -> Result<()> {
    ctx.bundles().delete(name)?;
    eprintln!("Deleted environment bundle '{}'", name);
    Ok(())
}

pub fn cmd_list(ctx: &AppContext) -> Result<()> {
    let bundles = ctx.bundles().list()?;
    println!("{}", serde_json::to_string_pretty(&bundles)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars() {
        let vars = parse_vars(&["A=1".to_string(), "B=x=y".to_string(), "A=2".to_string()])
            .expect("parse");
        assert_eq!(vars.get("A").map(String::as_str), Some("2"));
        assert_eq!(vars.get("B").map(String::as_str), Some("x=y"));
    }

    #[test]
    fn test_parse_vars_rejects_missing_equals() {
        assert!(parse_vars(&["NOPE".to_string()]).is_err());
        assert!(parse_vars(&["=v".to_string()]).is_err());
    }
}
