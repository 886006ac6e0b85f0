//! `{name}` / `{name:.2f}` 形式の簡易テンプレート

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::fields::display_value;

/// テンプレート展開エラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("missing key: {0}")]
    MissingKey(String),

    #[error("value for {0} is not a number")]
    NotANumber(String),
}

lazy_static::lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{(\w+)(?::\.(\d+)f)?\}").unwrap();
}

/// テンプレートを展開
///
/// `{cfg:.2f}` のような精度指定はJSON数値にのみ使える。
pub fn render(template: &str, params: &IndexMap<String, Value>) -> Result<String, RenderError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for cap in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);

        let key = name.as_str();
        let value = params
            .get(key)
            .ok_or_else(|| RenderError::MissingKey(key.to_string()))?;

        match cap.get(2) {
            Some(precision) => {
                let precision: usize = precision.as_str().parse().unwrap_or(0);
                let number = value
                    .as_f64()
                    .ok_or_else(|| RenderError::NotANumber(key.to_string()))?;
                out.push_str(&format!("{:.*}", precision, number));
            }
            None => out.push_str(&display_value(value)),
        }
        last = whole.end();
    }

    out.push_str(&template[last..]);
    Ok(out)
}
