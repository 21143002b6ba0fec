use global_pulse::filter::{FilterState, Lang};
use global_pulse::session::FeedSession;

#[test]
fn shared_link_decodes_to_the_documented_snapshot() {
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

    let query = state.encode_query();
    assert_eq!(query, "lang=zh&china=1&q=trade");
    assert!(!query.contains("country"));
    assert!(!query.contains("topic"));
}

#[test]
fn every_session_state_round_trips_through_its_query() {
    let mut session = FeedSession::new(FilterState::default());
    session.set_lang(Lang::Zh).expect("lang changed");
    session.set_draft_keyword("rare earth");
    session.submit_keyword().expect("keyword committed");
    session.set_country("united-states").expect("country changed");
    session.set_topic("technology").expect("topic changed");

    let query = session.query();
    assert_eq!(FilterState::decode_query(&query), *session.filter());
}

#[test]
fn reset_fires_exactly_one_effect() {
    let mut session = FeedSession::new(FilterState::decode_query(
        "lang=zh&china=1&q=trade&country=germany&topic=energy",
    ));

    let mut fetches = 0;
    if session.reset().is_some() {
        fetches += 1;
    }
    assert_eq!(fetches, 1);
    assert_eq!(session.filter(), &FilterState::default());
    assert_eq!(session.query(), "");
}

#[test]
fn draft_editing_produces_no_effects_until_submission() {
    let mut session = FeedSession::new(FilterState::default());

    let mut fetches = 0;
    session.set_draft_keyword("s");
    session.set_draft_keyword("sh");
    session.set_draft_keyword("shipping");
    if session.submit_keyword().is_some() {
        fetches += 1;
    }
    assert_eq!(fetches, 1);
    assert_eq!(session.filter().keyword, "shipping");
    assert_eq!(session.query(), "q=shipping");
}
