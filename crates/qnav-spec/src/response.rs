use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::answers::{Answer, AnswerStore, AnswerValue, Coding, PartialDate};
use crate::navigation::NavigableTask;
use crate::spec::Item;
use crate::visibility::VisibilityMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseStatus {
    InProgress,
    Completed,
}

/// Answer value tagged with its encoding, e.g. `{"valueInteger": 3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseAnswer {
    #[serde(rename = "valueBoolean")]
    Boolean(bool),
    #[serde(rename = "valueInteger")]
    Integer(i64),
    #[serde(rename = "valueDecimal")]
    Decimal(f64),
    #[serde(rename = "valueString")]
    String(String),
    #[serde(rename = "valueDate")]
    Date(PartialDate),
    #[serde(rename = "valueDateTime")]
    DateTime(NaiveDateTime),
    #[serde(rename = "valueTime")]
    Time(NaiveTime),
    #[serde(rename = "valueCoding")]
    Coding(Coding),
}

impl From<ResponseAnswer> for AnswerValue {
    fn from(answer: ResponseAnswer) -> Self {
        match answer {
            ResponseAnswer::Boolean(value) => AnswerValue::Boolean(value),
            ResponseAnswer::Integer(value) => AnswerValue::Integer(value),
            ResponseAnswer::Decimal(value) => AnswerValue::Decimal(value),
            ResponseAnswer::String(value) => AnswerValue::String(value),
            ResponseAnswer::Date(value) => AnswerValue::Date(value),
            ResponseAnswer::DateTime(value) => AnswerValue::DateTime(value),
            ResponseAnswer::Time(value) => AnswerValue::Time(value),
            ResponseAnswer::Coding(value) => AnswerValue::Coding(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseItem {
    pub link_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answer: Vec<ResponseAnswer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item: Vec<ResponseItem>,
}

/// Response mirroring the questionnaire's item hierarchy. Hidden and
/// unanswered items are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDocument {
    pub questionnaire: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: ResponseStatus,
    #[serde(default)]
    pub items: Vec<ResponseItem>,
}

impl ResponseDocument {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(self)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, serde_cbor::Error> {
        serde_cbor::from_slice(bytes)
    }
}

/// Builds the response document for `store`.
pub fn build_response(
    task: &NavigableTask,
    store: &AnswerStore,
    status: ResponseStatus,
) -> ResponseDocument {
    let visibility = task.visibility(store);
    ResponseDocument {
        questionnaire: task.identifier.clone(),
        title: task.title.clone(),
        status,
        items: response_items(task.items(), store, &visibility),
    }
}

fn response_items(items: &[Item], store: &AnswerStore, visibility: &VisibilityMap) -> Vec<ResponseItem> {
    items
        .iter()
        .filter_map(|item| {
            let answer = if visibility.get(&item.id).copied().unwrap_or(false) {
                store
                    .values(&item.id)
                    .unwrap_or_default()
                    .iter()
                    .map(ResponseAnswer::from)
                    .collect()
            } else {
                Vec::new()
            };
            let children = response_items(&item.items, store, visibility);
            if answer.is_empty() && children.is_empty() {
                return None;
            }
            Some(ResponseItem {
                link_id: item.id.clone(),
                text: item.text.clone(),
                answer,
                item: children,
            })
        })
        .collect()
}

impl From<&AnswerValue> for ResponseAnswer {
    fn from(value: &AnswerValue) -> Self {
        match value {
            AnswerValue::Boolean(value) => ResponseAnswer::Boolean(*value),
            AnswerValue::Integer(value) => ResponseAnswer::Integer(*value),
            AnswerValue::Decimal(value) => ResponseAnswer::Decimal(*value),
            AnswerValue::String(value) => ResponseAnswer::String(value.clone()),
            AnswerValue::Date(value) => ResponseAnswer::Date(*value),
            AnswerValue::DateTime(value) => ResponseAnswer::DateTime(*value),
            AnswerValue::Time(value) => ResponseAnswer::Time(*value),
            AnswerValue::Coding(value) => ResponseAnswer::Coding(value.clone()),
        }
    }
}

impl AnswerStore {
    /// Re-derives an answer store from a response document.
    pub fn from_response(document: &ResponseDocument) -> Self {
        let mut store = AnswerStore::new();
        collect(&document.items, &mut store);
        store
    }
}

fn collect(items: &[ResponseItem], store: &mut AnswerStore) {
    for item in items {
        if !item.answer.is_empty() {
            let values = item.answer.iter().cloned().map(AnswerValue::from).collect();
            store.record(item.link_id.clone(), Answer::many(values));
        }
        collect(&item.item, store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::DatePrecision;
    use crate::config::TaskOptions;
    use crate::navigation::Interview;
    use crate::spec::{Condition, ItemKind, Operator, Questionnaire};
    use serde_json::json;

    fn task() -> NavigableTask {
        let mut visit = Item::new("visit", ItemKind::Date);
        visit.date_precision = Some(DatePrecision::Month);
        let questionnaire = Questionnaire {
            id: Some("intake".into()),
            url: None,
            title: Some("Intake".into()),
            description: None,
            contained: Vec::new(),
            items: vec![
                Item::new("age", ItemKind::Numeric),
                Item::new("vitals", ItemKind::Group).with_items(vec![
                    Item::new("weight", ItemKind::Decimal),
                    visit,
                ]),
                Item::new("pregnant", ItemKind::SingleChoice)
                    .with_options([AnswerValue::Boolean(true), AnswerValue::Boolean(false)])
                    .enable_when(Condition::expression("answer-of(age) >= 12")),
                Item::new("intro", ItemKind::Display),
            ],
        };
        NavigableTask::build(&questionnaire, &TaskOptions::default()).expect("build")
    }

    #[test]
    fn response_mirrors_hierarchy_and_declared_encodings() {
        let task = task();
        let mut store = AnswerStore::new();
        store.record("age", AnswerValue::Integer(8));
        store.record("weight", AnswerValue::Integer(30));
        store.record("visit", AnswerValue::Date("2024-03-15".parse().expect("date")));
        store.record("pregnant", AnswerValue::Boolean(false));
        task.normalize(&mut store);

        let document = build_response(&task, &store, ResponseStatus::Completed);
        let encoded = serde_json::to_value(&document).expect("json");
        assert_eq!(
            encoded,
            json!({
                "questionnaire": "intake",
                "title": "Intake",
                "status": "completed",
                "items": [
                    {"linkId": "age", "answer": [{"valueInteger": 8}]},
                    {"linkId": "vitals", "item": [
                        {"linkId": "weight", "answer": [{"valueDecimal": 30.0}]},
                        {"linkId": "visit", "answer": [{"valueDate": "2024-03"}]}
                    ]}
                ]
            })
        );
    }

    #[test]
    fn stores_round_trip_through_both_encodings() {
        let task = task();
        let mut store = AnswerStore::new();
        store.record("age", AnswerValue::Integer(30));
        store.record("weight", AnswerValue::Decimal(61.5));
        store.record("pregnant", AnswerValue::Boolean(true));
        let document = build_response(&task, &store, ResponseStatus::InProgress);

        let json = document.to_json_pretty().expect("json");
        assert_eq!(ResponseDocument::from_json(&json).expect("parse"), document);
        let cbor = document.to_cbor().expect("cbor");
        assert_eq!(ResponseDocument::from_cbor(&cbor).expect("decode"), document);

        let restored = AnswerStore::from_response(&document);
        assert_eq!(restored, store);
        assert_eq!(task.visible_path(&restored), task.visible_path(&store));
    }

    fn gated_task() -> NavigableTask {
        let mut visit = Item::new("visit", ItemKind::Date);
        visit.date_precision = Some(DatePrecision::Month);
        let questionnaire = Questionnaire {
            id: Some("gated".into()),
            url: None,
            title: None,
            description: None,
            contained: Vec::new(),
            items: vec![
                visit,
                Item::new("follow-up", ItemKind::Text)
                    .enable_when(Condition::expression("answer-of(visit) >= @2024-03-10")),
                Item::new("weight", ItemKind::Decimal),
                Item::new("heavy", ItemKind::Text)
                    .enable_when(Condition::simple(
                        "weight",
                        Operator::Equals,
                        AnswerValue::Decimal(30.0),
                    )),
                Item::new("end", ItemKind::Text),
            ],
        };
        NavigableTask::build(&questionnaire, &TaskOptions::default()).expect("build")
    }

    #[test]
    fn document_carries_stored_values_unchanged() {
        let task = gated_task();
        let mut store = AnswerStore::new();
        store.record("visit", AnswerValue::Date("2024-03-15".parse().expect("date")));
        store.record("weight", AnswerValue::Integer(30));

        let document = build_response(&task, &store, ResponseStatus::InProgress);
        let restored = AnswerStore::from_response(&document);
        assert_eq!(restored, store);
        assert_eq!(task.visible_path(&restored), task.visible_path(&store));
    }

    #[test]
    fn interview_answers_keep_path_across_round_trip() {
        let task = gated_task();
        let mut interview = Interview::start(&task);
        interview
            .answer(AnswerValue::Date("2024-03-15".parse().expect("date")))
            .expect("visit");
        assert_eq!(
            interview.store().values("visit"),
            Some(&[AnswerValue::Date(PartialDate::YearMonth(2024, 3))][..])
        );
        let next = interview.advance().expect("advance");
        assert_eq!(next.map(|step| step.id.as_str()), Some("weight"));
        interview.answer(AnswerValue::Integer(30)).expect("weight");
        assert_eq!(
            interview.store().values("weight"),
            Some(&[AnswerValue::Decimal(30.0)][..])
        );

        let path = task.visible_path(interview.store());
        assert_eq!(path, vec!["visit", "weight", "heavy", "end"]);
        let document = interview.response();
        let json = document.to_json_pretty().expect("json");
        let restored = AnswerStore::from_response(&ResponseDocument::from_json(&json).expect("parse"));
        assert_eq!(&restored, interview.store());
        assert_eq!(task.visible_path(&restored), path);

        let resumed = Interview::resume(&task, restored);
        assert_eq!(task.visible_path(resumed.store()), path);
        assert_eq!(resumed.current().map(|step| step.id.as_str()), Some("heavy"));
    }

    #[test]
    fn resume_normalizes_raw_answers() {
        let task = gated_task();
        let mut store = AnswerStore::new();
        store.record("visit", AnswerValue::Date("2024-03-15".parse().expect("date")));
        store.record("follow-up", AnswerValue::String("stale".into()));
        store.record("weight", AnswerValue::Integer(30));

        let interview = Interview::resume(&task, store);
        assert!(interview.store().get("follow-up").is_none());
        let restored = AnswerStore::from_response(&interview.response());
        assert_eq!(&restored, interview.store());
        assert_eq!(task.visible_path(&restored), vec!["visit", "weight", "heavy", "end"]);
    }
}
