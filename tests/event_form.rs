use lecture_map::{Error, EventForm};

fn form() -> EventForm {
    EventForm {
        date: "12.05.2025".to_string(),
        institution_name: "TU Berlin".to_string(),
        address: "Straße des 17. Juni 135".to_string(),
        city: "Berlin".to_string(),
        state: "Berlin".to_string(),
        postal_code: "10623".to_string(),
        tables: "3".to_string(),
        participants: "40".to_string(),
    }
}

#[test]
fn complete_form_becomes_an_event() {
    let event = form().validate().unwrap();
    assert_eq!(event.institution_name, "TU Berlin");
    assert_eq!(event.postal_code, "10623");
    assert_eq!(event.table_count, 3);
    assert_eq!(event.participant_count, 40);
    assert_eq!(event.group_key(), ("TU Berlin", "Berlin"));
}

#[test]
fn empty_field_is_rejected() {
    let mut incomplete = form();
    incomplete.address = "   ".to_string();
    assert!(matches!(incomplete.validate(), Err(Error::Validation(_))));
}

#[test]
fn counts_must_be_positive_integers() {
    for bad in ["0", "-1", "2.5", "viele"] {
        let mut f = form();
        f.participants = bad.to_string();
        assert!(
            matches!(f.validate(), Err(Error::Validation(_))),
            "accepted {:?}",
            bad
        );
    }
}

#[test]
fn state_must_be_a_german_state() {
    let mut f = form();
    f.state = "Tirol".to_string();
    assert!(matches!(f.validate(), Err(Error::Validation(_))));

    f.state = "Bayern".to_string();
    assert!(f.validate().is_ok());
}
