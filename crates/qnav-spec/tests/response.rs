use qnav_spec::{
    Answer, AnswerStore, AnswerValue, Coding, Interview, NavigableTask, Questionnaire,
    ResponseDocument, ResponseStatus, TaskOptions, build_response,
};

fn task() -> NavigableTask {
    let questionnaire: Questionnaire =
        serde_json::from_str(include_str!("fixtures/skip_logic.json")).expect("deserialize");
    NavigableTask::build(&questionnaire, &TaskOptions::default()).expect("build")
}

fn answered_interview(task: &NavigableTask) -> Interview<'_> {
    let mut interview = Interview::start(task);
    interview.advance().expect("past intro");
    interview
        .answer(AnswerValue::String("Yes".into()))
        .expect("likes");
    interview.advance().expect("favourite");
    interview.advance().expect("toppings");
    interview
        .answer(Answer::many(vec![AnswerValue::Coding(Coding::new(
            Some("urn:toppings"),
            "nuts",
            Some("Nuts"),
        ))]))
        .expect("toppings");
    interview.advance().expect("allergy");
    interview
        .answer(AnswerValue::Boolean(true))
        .expect("allergy");
    interview.advance().expect("servings");
    interview
        .answer(AnswerValue::Integer(9))
        .expect("servings");
    interview.advance().expect("cut-down");
    interview
}

#[test]
fn response_round_trip_reproduces_the_path() {
    let task = task();
    let interview = answered_interview(&task);
    let document = interview.response();
    assert_eq!(document.status, ResponseStatus::InProgress);

    let json = document.to_json_pretty().expect("json");
    let restored = AnswerStore::from_response(&ResponseDocument::from_json(&json).expect("parse"));
    assert_eq!(&restored, interview.store());
    assert_eq!(
        task.visible_path(&restored),
        task.visible_path(interview.store())
    );
    for rule in &task.rules {
        assert_eq!(
            rule.predicate.evaluate(&restored),
            rule.predicate.evaluate(interview.store()),
            "rule for {}",
            rule.step
        );
    }

    // The optional favourite was skipped, so a resumed run lands there first.
    let resumed = Interview::resume(&task, restored);
    assert_eq!(
        resumed.current().map(|step| step.id.as_str()),
        Some("favourite")
    );
}

#[test]
fn groups_are_preserved_and_hidden_items_omitted() {
    let task = task();
    let mut interview = answered_interview(&task);
    interview
        .answer(AnswerValue::String("No".into()))
        .expect("cut-down");
    assert!(interview.advance().expect("finish").is_none());

    let document = interview.response();
    assert_eq!(document.status, ResponseStatus::Completed);
    let top: Vec<_> = document.items.iter().map(|item| item.link_id.as_str()).collect();
    assert_eq!(top, vec!["likes-dessert", "ice-cream", "servings", "cut-down"]);
    let group: Vec<_> = document.items[1]
        .item
        .iter()
        .map(|item| item.link_id.as_str())
        .collect();
    assert_eq!(group, vec!["toppings", "nut-allergy"]);

    let mut store = interview.store().clone();
    store.record("likes-dessert", AnswerValue::String("No".into()));
    let hidden = build_response(&task, &store, ResponseStatus::InProgress);
    assert!(hidden.items.iter().all(|item| item.link_id != "ice-cream"));
}

#[test]
fn cbor_encoding_round_trips() {
    let task = task();
    let interview = answered_interview(&task);
    let document = interview.response();
    let bytes = document.to_cbor().expect("encode");
    assert_eq!(ResponseDocument::from_cbor(&bytes).expect("decode"), document);
}
