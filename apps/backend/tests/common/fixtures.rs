//! Test fixtures and factory functions for upstream payloads.
//!
//! Shapes mirror the WaniKani v2 resources closely enough for the client to
//! decode them; fields the service ignores are left out.

use serde_json::{json, Value};

/// `data` block for `GET /user`.
pub fn user(username: &str, level: i64) -> Value {
    json!({
        "username": username,
        "level": level,
        "profile_url": format!("https://www.wanikani.com/users/{username}"),
        "subscription": { "active": true, "max_level_granted": 60 }
    })
}

/// Kanji summary resource as returned in a `/subjects` collection.
pub fn kanji(id: i64, level: i64, characters: &str, meaning: &str, reading: &str) -> Value {
    json!({
        "id": id,
        "object": "kanji",
        "data": {
            "level": level,
            "characters": characters,
            "meanings": [{ "meaning": meaning, "primary": true }],
            "readings": [{ "reading": reading, "primary": true }]
        }
    })
}

/// Radical resource without characters, so the slug stands in.
pub fn radical(id: i64, level: i64, slug: &str) -> Value {
    json!({
        "id": id,
        "object": "radical",
        "data": {
            "level": level,
            "characters": null,
            "slug": slug,
            "meanings": [{ "meaning": slug, "primary": true }]
        }
    })
}

/// Full vocabulary resource as returned by `GET /subjects/{id}`.
pub fn vocabulary_detail(id: i64, level: i64, characters: &str, parts_of_speech: &[&str]) -> Value {
    json!({
        "id": id,
        "object": "vocabulary",
        "data": {
            "level": level,
            "characters": characters,
            "meanings": [{ "meaning": format!("meaning {id}"), "primary": true }],
            "readings": [{ "reading": format!("よみ{id}"), "primary": true }],
            "component_subject_ids": [id + 1000],
            "meaning_mnemonic": format!("Remember {characters}."),
            "reading_mnemonic": "Say it out loud.",
            "context_sentences": [{ "ja": format!("{characters}です。"), "en": "It is that." }],
            "parts_of_speech": parts_of_speech
        }
    })
}

/// Assignment resource linking a subject to its SRS stage.
pub fn assignment(id: i64, subject_id: i64, subject_type: &str, srs_stage: i64) -> Value {
    json!({
        "id": id,
        "object": "assignment",
        "data": {
            "subject_id": subject_id,
            "subject_type": subject_type,
            "srs_stage": srs_stage,
            "available_at": "2025-01-01T00:00:00.000000Z",
            "unlocked_at": "2024-12-01T00:00:00.000000Z",
            "started_at": if srs_stage > 0 { Some("2024-12-02T00:00:00.000000Z") } else { None },
            "passed_at": null,
            "burned_at": null
        }
    })
}

/// Review assignment available at `available_at`.
pub fn review(id: i64, subject_id: i64, srs_stage: i64, available_at: &str) -> Value {
    json!({
        "id": id,
        "object": "assignment",
        "data": {
            "subject_id": subject_id,
            "subject_type": "kanji",
            "srs_stage": srs_stage,
            "available_at": available_at
        }
    })
}

/// Vocabulary details for a run of ids, with the characters `語{id}`.
pub fn vocabulary_batch(ids: &[i64]) -> Vec<Value> {
    ids.iter()
        .map(|&id| vocabulary_detail(id, 1, &format!("語{id}"), &["noun"]))
        .collect()
}
