//! SPARK checkpoint sections
//!
//! A student's checkpoint record is built from five sections that are saved
//! independently: Sensing, Probing, Acting, Reflecting and Knowing. Each save
//! replaces one section and leaves the others untouched. Every section has a
//! local precondition that must hold before it may be stored; the rule is not
//! persisted with the data.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::text::{clean_list, word_count};
use crate::{Error, Result};

/// Minimum words in the Sensing snapshot
pub const SNAPSHOT_MIN_WORDS: usize = 150;
/// Maximum words in the Sensing snapshot
pub const SNAPSHOT_MAX_WORDS: usize = 220;
/// Minimum words for each Reflecting answer
pub const REFLECTION_MIN_WORDS: usize = 20;

/// UN Sustainable Development Goals accepted as Knowing tags
pub const SDGS: [&str; 17] = [
    "No Poverty",
    "Zero Hunger",
    "Good Health and Well-being",
    "Quality Education",
    "Gender Equality",
    "Clean Water and Sanitation",
    "Affordable and Clean Energy",
    "Decent Work and Economic Growth",
    "Industry, Innovation and Infrastructure",
    "Reduced Inequalities",
    "Sustainable Cities and Communities",
    "Responsible Consumption and Production",
    "Climate Action",
    "Life Below Water",
    "Life on Land",
    "Peace, Justice and Strong Institutions",
    "Partnerships for the Goals",
];

/// The five checkpoint sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionName {
    Sensing,
    Probing,
    Acting,
    Reflecting,
    Knowing,
}

impl SectionName {
    pub const ALL: [SectionName; 5] = [
        SectionName::Sensing,
        SectionName::Probing,
        SectionName::Acting,
        SectionName::Reflecting,
        SectionName::Knowing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionName::Sensing => "sensing",
            SectionName::Probing => "probing",
            SectionName::Acting => "acting",
            SectionName::Reflecting => "reflecting",
            SectionName::Knowing => "knowing",
        }
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SectionName::ALL
            .into_iter()
            .find(|name| name.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown SPARK section: {}", s)))
    }
}

/// Emotional valence of the Sensing snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Valence {
    Positive,
    Negative,
    Mixed,
}

impl Valence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Valence::Positive => "positive",
            Valence::Negative => "negative",
            Valence::Mixed => "mixed",
        }
    }
}

impl FromStr for Valence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Valence::Positive),
            "negative" => Ok(Valence::Negative),
            "mixed" => Ok(Valence::Mixed),
            other => Err(Error::InvalidInput(format!("Unknown valence: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensing {
    pub snapshot: String,
    pub valence: Valence,
    #[serde(default)]
    pub evidence_url: String,
}

/// One row of the Probing data plan: what data, from where, who, by when
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPlanRow {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub due: Option<NaiveDate>,
}

impl DataPlanRow {
    /// A row counts only if one of data/source/owner is filled
    pub fn is_blank(&self) -> bool {
        self.data.trim().is_empty() && self.source.trim().is_empty() && self.owner.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probing {
    pub hypothesis: String,
    #[serde(default)]
    pub data_plan: Vec<DataPlanRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acting {
    #[serde(default)]
    pub decisions: Vec<String>,
    #[serde(default)]
    pub learnings: Vec<String>,
    #[serde(default)]
    pub changes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflecting {
    pub tension: String,
    pub assumption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextAction {
    pub action: String,
    pub owner: String,
    #[serde(default)]
    pub due: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knowing {
    pub insights: [String; 2],
    #[serde(default)]
    pub sdgs: Vec<String>,
    pub next_action: NextAction,
}

/// One section's payload, as submitted for a save
#[derive(Debug, Clone, PartialEq)]
pub enum SparkSection {
    Sensing(Sensing),
    Probing(Probing),
    Acting(Acting),
    Reflecting(Reflecting),
    Knowing(Knowing),
}

impl SparkSection {
    /// Decode a section payload for the named section
    pub fn from_json(name: SectionName, payload: serde_json::Value) -> Result<Self> {
        let section = match name {
            SectionName::Sensing => SparkSection::Sensing(serde_json::from_value(payload)?),
            SectionName::Probing => SparkSection::Probing(serde_json::from_value(payload)?),
            SectionName::Acting => SparkSection::Acting(serde_json::from_value(payload)?),
            SectionName::Reflecting => SparkSection::Reflecting(serde_json::from_value(payload)?),
            SectionName::Knowing => SparkSection::Knowing(serde_json::from_value(payload)?),
        };
        Ok(section)
    }

    pub fn name(&self) -> SectionName {
        match self {
            SparkSection::Sensing(_) => SectionName::Sensing,
            SparkSection::Probing(_) => SectionName::Probing,
            SparkSection::Acting(_) => SectionName::Acting,
            SparkSection::Reflecting(_) => SectionName::Reflecting,
            SparkSection::Knowing(_) => SectionName::Knowing,
        }
    }

    /// Normalize the payload and check the section's save precondition
    ///
    /// Text is trimmed, blank list items and blank data-plan rows are dropped.
    pub fn validate(self) -> Result<Self> {
        let name = self.name();
        let reject = |message: String| Error::Section {
            section: name,
            message,
        };

        match self {
            SparkSection::Sensing(mut s) => {
                s.snapshot = s.snapshot.trim().to_string();
                s.evidence_url = s.evidence_url.trim().to_string();
                let words = word_count(&s.snapshot);
                if !(SNAPSHOT_MIN_WORDS..=SNAPSHOT_MAX_WORDS).contains(&words) {
                    return Err(reject(format!(
                        "snapshot must have between {} and {} words (has {})",
                        SNAPSHOT_MIN_WORDS, SNAPSHOT_MAX_WORDS, words
                    )));
                }
                Ok(SparkSection::Sensing(s))
            }
            SparkSection::Probing(mut p) => {
                p.hypothesis = p.hypothesis.trim().to_string();
                p.data_plan = p
                    .data_plan
                    .into_iter()
                    .filter(|row| !row.is_blank())
                    .map(|row| DataPlanRow {
                        data: row.data.trim().to_string(),
                        source: row.source.trim().to_string(),
                        owner: row.owner.trim().to_string(),
                        due: row.due,
                    })
                    .collect();
                if p.hypothesis.is_empty() {
                    return Err(reject("an abductive hypothesis is required".to_string()));
                }
                if p.data_plan.is_empty() {
                    return Err(reject("add at least one data plan row".to_string()));
                }
                Ok(SparkSection::Probing(p))
            }
            SparkSection::Acting(a) => Ok(SparkSection::Acting(Acting {
                decisions: clean_list(a.decisions),
                learnings: clean_list(a.learnings),
                changes: clean_list(a.changes),
            })),
            SparkSection::Reflecting(mut r) => {
                r.tension = r.tension.trim().to_string();
                r.assumption = r.assumption.trim().to_string();
                if word_count(&r.tension) < REFLECTION_MIN_WORDS
                    || word_count(&r.assumption) < REFLECTION_MIN_WORDS
                {
                    return Err(reject(format!(
                        "tension and assumption need at least {} words each",
                        REFLECTION_MIN_WORDS
                    )));
                }
                Ok(SparkSection::Reflecting(r))
            }
            SparkSection::Knowing(mut k) => {
                for insight in k.insights.iter_mut() {
                    *insight = insight.trim().to_string();
                }
                k.sdgs = clean_list(k.sdgs);
                k.next_action.action = k.next_action.action.trim().to_string();
                k.next_action.owner = k.next_action.owner.trim().to_string();

                if k.insights.iter().any(|i| i.is_empty())
                    || k.sdgs.is_empty()
                    || k.next_action.action.is_empty()
                    || k.next_action.owner.is_empty()
                {
                    return Err(reject(
                        "complete both insights, at least one SDG, the action and its owner"
                            .to_string(),
                    ));
                }
                if let Some(unknown) = k.sdgs.iter().find(|sdg| !SDGS.contains(&sdg.as_str())) {
                    return Err(reject(format!("unknown SDG: {}", unknown)));
                }
                Ok(SparkSection::Knowing(k))
            }
        }
    }
}

/// A student's merged checkpoint record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparkEntry {
    pub id: i64,
    pub email: String,
    pub team: Option<String>,
    pub sensing: Option<Sensing>,
    pub probing: Option<Probing>,
    pub acting: Option<Acting>,
    pub reflecting: Option<Reflecting>,
    pub knowing: Option<Knowing>,
    pub updated_at: DateTime<Utc>,
}

impl SparkEntry {
    /// Blank record for an email that has never saved a section
    pub fn blank(email: &str, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            email: email.to_string(),
            team: None,
            sensing: None,
            probing: None,
            acting: None,
            reflecting: None,
            knowing: None,
            updated_at,
        }
    }

    /// Overlay one section, leaving the other four as they are
    pub fn apply(&mut self, section: SparkSection) {
        match section {
            SparkSection::Sensing(s) => self.sensing = Some(s),
            SparkSection::Probing(p) => self.probing = Some(p),
            SparkSection::Acting(a) => self.acting = Some(a),
            SparkSection::Reflecting(r) => self.reflecting = Some(r),
            SparkSection::Knowing(k) => self.knowing = Some(k),
        }
    }

    pub fn has_section(&self, name: SectionName) -> bool {
        match name {
            SectionName::Sensing => self.sensing.is_some(),
            SectionName::Probing => self.probing.is_some(),
            SectionName::Acting => self.acting.is_some(),
            SectionName::Reflecting => self.reflecting.is_some(),
            SectionName::Knowing => self.knowing.is_some(),
        }
    }

    /// Number of saved sections (5 means SPARK complete)
    pub fn completion(&self) -> usize {
        SectionName::ALL
            .iter()
            .filter(|name| self.has_section(**name))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn words(n: usize) -> String {
        vec!["palabra"; n].join(" ")
    }

    fn sensing(n: usize) -> SparkSection {
        SparkSection::Sensing(Sensing {
            snapshot: words(n),
            valence: Valence::Mixed,
            evidence_url: String::new(),
        })
    }

    fn section_error(result: Result<SparkSection>) -> SectionName {
        match result {
            Err(Error::Section { section, .. }) => section,
            other => panic!("expected section error, got {:?}", other),
        }
    }

    #[test]
    fn test_section_name_parse() {
        assert_eq!("Probing".parse::<SectionName>().unwrap(), SectionName::Probing);
        assert!("planning".parse::<SectionName>().is_err());
    }

    #[test]
    fn test_sensing_word_bounds() {
        assert_eq!(section_error(sensing(100).validate()), SectionName::Sensing);
        assert!(sensing(180).validate().is_ok());
        assert!(sensing(150).validate().is_ok());
        assert!(sensing(220).validate().is_ok());
        assert!(sensing(221).validate().is_err());
    }

    #[test]
    fn test_probing_requires_hypothesis_and_filled_row() {
        let blank_rows = SparkSection::Probing(Probing {
            hypothesis: "Creemos que el museo calla".into(),
            data_plan: vec![DataPlanRow::default(), DataPlanRow::default()],
        });
        assert_eq!(section_error(blank_rows.validate()), SectionName::Probing);

        let no_hypothesis = SparkSection::Probing(Probing {
            hypothesis: "   ".into(),
            data_plan: vec![DataPlanRow {
                data: "visitas".into(),
                ..Default::default()
            }],
        });
        assert!(no_hypothesis.validate().is_err());

        let ok = SparkSection::Probing(Probing {
            hypothesis: "Creemos que el museo calla".into(),
            data_plan: vec![
                DataPlanRow::default(),
                DataPlanRow {
                    owner: " Ana ".into(),
                    ..Default::default()
                },
            ],
        })
        .validate()
        .unwrap();
        match ok {
            SparkSection::Probing(p) => {
                assert_eq!(p.data_plan.len(), 1);
                assert_eq!(p.data_plan[0].owner, "Ana");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_acting_accepts_anything() {
        let acting = SparkSection::Acting(Acting {
            decisions: vec!["".into(), " seguir ".into()],
            ..Default::default()
        })
        .validate()
        .unwrap();
        assert_eq!(
            acting,
            SparkSection::Acting(Acting {
                decisions: vec!["seguir".into()],
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_reflecting_min_words() {
        let short = SparkSection::Reflecting(Reflecting {
            tension: words(19),
            assumption: words(40),
        });
        assert!(short.validate().is_err());

        let ok = SparkSection::Reflecting(Reflecting {
            tension: words(20),
            assumption: words(20),
        });
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_knowing_requires_all_parts() {
        let payload = json!({
            "insights": ["El archivo es espejo", "La memoria es colectiva"],
            "sdgs": ["Quality Education"],
            "next_action": {"action": "Exponer", "owner": "Equipo 3", "due": "2025-05-01"}
        });
        let knowing = SparkSection::from_json(SectionName::Knowing, payload.clone()).unwrap();
        assert!(knowing.validate().is_ok());

        let mut no_sdg = payload.clone();
        no_sdg["sdgs"] = json!([]);
        let section = SparkSection::from_json(SectionName::Knowing, no_sdg).unwrap();
        assert!(section.validate().is_err());

        let mut bad_sdg = payload;
        bad_sdg["sdgs"] = json!(["Moon Landing"]);
        let section = SparkSection::from_json(SectionName::Knowing, bad_sdg).unwrap();
        assert!(section.validate().is_err());
    }

    #[test]
    fn test_apply_preserves_other_sections() {
        let mut entry = SparkEntry::blank("ana@example.com", Utc::now());
        entry.apply(sensing(180));
        entry.apply(SparkSection::Acting(Acting::default()));
        assert!(entry.sensing.is_some());
        assert!(entry.acting.is_some());
        assert_eq!(entry.completion(), 2);
    }
}
