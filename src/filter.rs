//! Filter snapshot and its query-string codec.
//!
//! A `FilterState` is an immutable snapshot of the five feed criteria.
//! User actions build new snapshots; fetch results and push events never
//! mutate one. `decode_query`/`encode_query` bind the snapshot to the
//! shareable query string: decoding tolerates anything, encoding omits
//! every field that still holds its default.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::form_urlencoded;

/// Feed language. Anything the backend does not recognize falls back to
/// English, both here and server-side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    Zh,
}

impl Lang {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Zh => "zh",
        }
    }

    /// Lenient parse for query/CLI parameters: `"zh"` selects Chinese,
    /// everything else (including garbage) is English.
    pub fn from_param(value: &str) -> Lang {
        if value == "zh" {
            Lang::Zh
        } else {
            Lang::En
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One feed query. All five fields jointly define it; the empty string
/// means "no restriction" for the free-text fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub lang: Lang,
    pub china_only: bool,
    pub keyword: String,
    pub country: String,
    pub topic: String,
}

impl FilterState {
    /// Decode a page query string (with or without the leading `?`).
    ///
    /// Unknown keys are ignored and each malformed value falls back to
    /// that field's default alone; this never fails.
    pub fn decode_query(query: &str) -> FilterState {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut state = FilterState::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "lang" => state.lang = Lang::from_param(&value),
                "china" => state.china_only = value == "1",
                "q" => state.keyword = value.trim().to_string(),
                "country" => state.country = value.trim().to_string(),
                "topic" => state.topic = value.trim().to_string(),
                _ => {}
            }
        }
        state
    }

    /// Encode the snapshot as a shareable query string. Fields equal to
    /// their default are omitted entirely, so the all-default snapshot
    /// encodes to the empty string.
    pub fn encode_query(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        if self.lang != Lang::default() {
            out.append_pair("lang", self.lang.as_str());
        }
        if self.china_only {
            out.append_pair("china", "1");
        }
        if !self.keyword.is_empty() {
            out.append_pair("q", &self.keyword);
        }
        if !self.country.is_empty() {
            out.append_pair("country", &self.country);
        }
        if !self.topic.is_empty() {
            out.append_pair("topic", &self.topic);
        }
        out.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_encodes_empty() {
        assert_eq!(FilterState::default().encode_query(), "");
    }

    #[test]
    fn decode_known_parameters() {
        let state = FilterState::decode_query("?lang=zh&china=1&q=trade");
        assert_eq!(
            state,
            FilterState {
                lang: Lang::Zh,
                china_only: true,
                keyword: "trade".into(),
                country: String::new(),
                topic: String::new(),
            }
        );
    }

    #[test]
    fn reencode_omits_defaults() {
        let state = FilterState::decode_query("lang=zh&china=1&q=trade");
        let query = state.encode_query();
        assert_eq!(query, "lang=zh&china=1&q=trade");
        assert!(!query.contains("country"));
        assert!(!query.contains("topic"));
    }

    #[test]
    fn malformed_values_fall_back_per_field() {
        let state = FilterState::decode_query("lang=klingon&china=yes&country=germany&bogus=1");
        assert_eq!(state.lang, Lang::En);
        assert!(!state.china_only);
        assert_eq!(state.country, "germany");
        assert_eq!(state.topic, "");
    }

    #[test]
    fn round_trip_all_set() {
        let state = FilterState {
            lang: Lang::Zh,
            china_only: true,
            keyword: "rare earth".into(),
            country: "united-states".into(),
            topic: "technology".into(),
        };
        assert_eq!(FilterState::decode_query(&state.encode_query()), state);
    }

    #[test]
    fn round_trip_all_default() {
        let state = FilterState::default();
        assert_eq!(FilterState::decode_query(&state.encode_query()), state);
    }

    #[test]
    fn decode_trims_free_text() {
        let state = FilterState::decode_query("q=+trade++&topic=%20energy%20");
        assert_eq!(state.keyword, "trade");
        assert_eq!(state.topic, "energy");
    }
}
