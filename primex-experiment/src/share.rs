use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::config::ExperimentConfig;
use crate::error::{Error, Result};

/// Query parameter carrying the token.
pub const QUERY_PARAM: &str = "exp";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experimenter {
    pub email: String,
    pub experiment_id: String,
}

impl Experimenter {
    pub fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(Error::invalid(format!(
                "experimenter email '{}' is not valid",
                self.email
            )));
        }
        if self.experiment_id.trim().chars().count() < 3 {
            return Err(Error::invalid(
                "experiment id must be at least 3 characters",
            ));
        }
        Ok(())
    }
}

/// A configuration travelling inside a link, with who it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedExperiment {
    pub config: ExperimentConfig,
    pub experimenter: Experimenter,
}

impl SharedExperiment {
    pub fn new(config: ExperimentConfig, experimenter: Experimenter) -> Self {
        Self {
            config,
            experimenter,
        }
    }

    /// JSON, then URL-safe base64 without padding.
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| Error::invalid(format!("cannot serialize configuration: {e}")))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Accepts tokens with or without trailing padding.
    pub fn decode(token: &str) -> Result<Self> {
        let token = token.trim().trim_end_matches('=');
        if token.is_empty() {
            return Err(Error::DecodeFailure("empty token".into()));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| Error::DecodeFailure(format!("token is not base64: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::DecodeFailure(format!("token payload is not an experiment: {e}")))
    }

    /// Builds a participant link. Experimenter details and the configuration
    /// are checked first so that no broken link is handed out.
    pub fn link(&self, base_url: &str) -> Result<String> {
        self.experimenter.validate()?;
        self.config.validate()?;
        let sep = if base_url.contains('?') { '&' } else { '?' };
        Ok(format!("{base_url}{sep}{QUERY_PARAM}={}", self.encode()?))
    }
}

/// Pulls the `exp` value out of a URL or a bare query string.
pub fn token_from_query(url_or_query: &str) -> Option<&str> {
    let query = match url_or_query.split_once('?') {
        Some((_, q)) => q,
        None => url_or_query,
    };
    let query = query.split('#').next().unwrap_or_default();
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == QUERY_PARAM)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

/// Decodes the token of a link, if it carries one.
pub fn from_link(url: &str) -> Option<Result<SharedExperiment>> {
    token_from_query(url).map(SharedExperiment::decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        GenericPrimingParams, Pairing, PresentationMode, PrimeMode, ResponseKeys, StimulusSet,
    };
    use assert_matches::assert_matches;
    use primex_core::StimulusKind;

    fn experimenter() -> Experimenter {
        Experimenter {
            email: "lab@example.org".into(),
            experiment_id: "spring-cohort".into(),
        }
    }

    fn awkward_generic() -> ExperimentConfig {
        let params = GenericPrimingParams {
            primes: StimulusSet {
                kind: StimulusKind::Text,
                items: vec!["doctor, nurse".into(), "say \"hello\"".into(), "кошка".into()],
            },
            targets: StimulusSet {
                kind: StimulusKind::Text,
                items: vec!["犬".into(), "שלום".into()],
            },
            pairings: Some(vec![Pairing {
                prime_index: 2,
                target_index: 0,
                condition: "related, \"semantic\"".into(),
                correct_response: Some("word".into()),
            }]),
            repetitions: 3,
            presentation: PresentationMode::Sequential,
            baseline_condition: None,
        };
        let mut config =
            ExperimentConfig::generic(params, ResponseKeys::new([("word", "j"), ("nonword", "f")]));
        config.name = "Prime, \"quoted\" מבחן".into();
        config
    }

    #[test]
    fn round_trip_keeps_commas_quotes_and_non_latin_text() {
        let shared = SharedExperiment::new(awkward_generic(), experimenter());
        let token = shared.encode().unwrap();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "{token}"
        );
        assert_eq!(SharedExperiment::decode(&token).unwrap(), shared);
    }

    #[test]
    fn round_trip_of_builtin_stroop() {
        let shared = SharedExperiment::new(ExperimentConfig::stroop("ar", "zh").unwrap(), experimenter());
        let decoded = SharedExperiment::decode(&shared.encode().unwrap()).unwrap();
        assert_eq!(decoded.config, shared.config);
    }

    #[test]
    fn padded_token_is_accepted() {
        let shared = SharedExperiment::new(ExperimentConfig::number_priming(PrimeMode::Masked), experimenter());
        let token = format!("{}==", shared.encode().unwrap());
        assert_eq!(SharedExperiment::decode(&token).unwrap(), shared);
    }

    #[test]
    fn garbage_is_a_decode_failure() {
        assert_matches!(SharedExperiment::decode("!!!"), Err(Error::DecodeFailure(_)));
        assert_matches!(SharedExperiment::decode(""), Err(Error::DecodeFailure(_)));
        let not_an_experiment = URL_SAFE_NO_PAD.encode(br#"{"hello":"world"}"#);
        assert_matches!(
            SharedExperiment::decode(&not_an_experiment),
            Err(Error::DecodeFailure(_))
        );
    }

    #[test]
    fn link_requires_valid_experimenter() {
        let mut shared = SharedExperiment::new(awkward_generic(), experimenter());
        shared.experimenter.email = "not-an-email".into();
        assert_matches!(shared.link("https://x.test/run"), Err(Error::InvalidConfiguration(_)));

        shared.experimenter = Experimenter {
            experiment_id: "ab".into(),
            ..experimenter()
        };
        assert_matches!(shared.link("https://x.test/run"), Err(Error::InvalidConfiguration(_)));
    }

    #[test]
    fn link_token_can_be_read_back() {
        let shared = SharedExperiment::new(awkward_generic(), experimenter());
        let link = shared.link("https://x.test/run?lang=en").unwrap();
        assert!(link.starts_with("https://x.test/run?lang=en&exp="));
        assert_eq!(from_link(&link).unwrap().unwrap(), shared);
    }

    #[test]
    fn token_lookup_handles_fragments_and_absence() {
        assert_eq!(token_from_query("exp=abc"), Some("abc"));
        assert_eq!(token_from_query("https://a.b/?x=1&exp=abc#top"), Some("abc"));
        assert_eq!(token_from_query("https://a.b/?x=1"), None);
        assert_eq!(token_from_query("https://a.b/?exp="), None);
        assert!(from_link("https://a.b/").is_none());
    }
}
