//! Deep extraction (spec §4.7 step 5): asks the generation model for the
//! entities and relationships mentioned in an episode's text. Always
//! re-extracts from the raw text rather than reusing NER pre-filter spans
//! (spec §9 Open Question: "deep always re-extracts").

use serde::Deserialize;

use crate::embeddings::EmbeddingProvider;
use crate::error::Result;
use crate::types::{EntityType, ExtractedEntity, ExtractedRelation, RelationType};

#[derive(Debug, Deserialize)]
struct RawEntity {
    name: String,
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default = "default_confidence")]
    confidence: f32,
}

fn default_confidence() -> f32 {
    0.5
}

#[derive(Debug, Deserialize)]
struct RawRelation {
    subject: String,
    subject_type: String,
    object: String,
    object_type: String,
    relation_type: String,
    #[serde(default = "default_weight")]
    weight: f32,
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    entities: Vec<RawEntity>,
    #[serde(default)]
    relationships: Vec<RawRelation>,
}

/// Result of extracting mentions and relationships from one episode's text.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub entities: Vec<ExtractedEntity>,
    pub relations: Vec<ExtractedRelation>,
}

/// Run deep extraction against `text` via the generation model.
///
/// On a malformed or unparseable response, returns an empty extraction
/// rather than an error: entity/relationship extraction has a safe
/// fallback (spec §7), so the ingestor can proceed with just the episode.
pub async fn extract(embeddings: &dyn EmbeddingProvider, text: &str) -> Result<Extraction> {
    let prompt = format!(
        "Extract named entities and relationships from this message. \
         Reply with a JSON object: {{\"entities\": [{{\"name\":...,\"type\":...,\"confidence\":...}}], \
         \"relationships\": [{{\"subject\":...,\"subject_type\":...,\"object\":...,\"object_type\":...,\
         \"relation_type\":...,\"weight\":...}}]}}. Entity types are one of PERSON, ORG, GPE, LOC, FAC, \
         PRODUCT, EVENT, WORK_OF_ART, LAW, LANGUAGE, NORP, DATE, TIME, MONEY, PERCENT, QUANTITY, \
         CARDINAL, ORDINAL, OTHER.\n\nMessage: {text}"
    );

    let response = match embeddings.generate(&prompt).await {
        Ok(r) => r,
        Err(err) if err.has_safe_fallback() => return Ok(Extraction::default()),
        Err(err) => return Err(err),
    };

    let Some(raw) = parse_extraction(&response) else {
        return Ok(Extraction::default());
    };

    let entities = raw
        .entities
        .into_iter()
        .filter_map(|e| {
            let entity_type = e.entity_type.parse::<EntityType>().ok()?;
            Some(ExtractedEntity {
                name: e.name,
                entity_type,
                confidence: e.confidence,
                span: None,
            })
        })
        .collect();

    let relations = raw
        .relationships
        .into_iter()
        .filter_map(|r| {
            let subject_type = r.subject_type.parse::<EntityType>().ok()?;
            let object_type = r.object_type.parse::<EntityType>().ok()?;
            Some(ExtractedRelation {
                subject: ExtractedEntity {
                    name: r.subject,
                    entity_type: subject_type,
                    confidence: default_confidence(),
                    span: None,
                },
                object: ExtractedEntity {
                    name: r.object,
                    entity_type: object_type,
                    confidence: default_confidence(),
                    span: None,
                },
                relation_type: RelationType::from(r.relation_type.as_str()),
                weight: r.weight,
            })
        })
        .collect();

    Ok(Extraction { entities, relations })
}

fn parse_extraction(response: &str) -> Option<RawExtraction> {
    let stripped = crate::jsonutil::strip_code_fences(response);
    let json_slice = crate::jsonutil::first_json_object(stripped)?;
    serde_json::from_str(json_slice).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entities_and_relationships() {
        let response = r#"{"entities": [{"name": "Sarah Chen", "type": "PERSON", "confidence": 0.9}],
            "relationships": []}"#;
        let raw = parse_extraction(response).unwrap();
        assert_eq!(raw.entities.len(), 1);
        assert_eq!(raw.entities[0].name, "Sarah Chen");
    }

    #[test]
    fn unknown_entity_type_is_dropped_not_fatal() {
        let response = r#"{"entities": [{"name": "X", "type": "NOT_A_TYPE"}], "relationships": []}"#;
        let raw = parse_extraction(response).unwrap();
        assert_eq!(raw.entities[0].entity_type, "NOT_A_TYPE");
    }

    #[test]
    fn missing_object_returns_none() {
        assert!(parse_extraction("no json at all").is_none());
    }
}
