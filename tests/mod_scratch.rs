use noteful::query::Filter;
use noteful::runner::QueryRunner;
use noteful::scratch::{run_scenario, steps};
use noteful::{Note, connect};

fn scenario_output(name: &str) -> (String, u64) {
    let conn = connect(&format!("memory://{name}")).unwrap();
    let mut out = Vec::new();
    let ran = run_scenario(&conn, true, &mut out).unwrap();
    assert_eq!(ran, steps().unwrap().len());
    let remaining = QueryRunner::<Note>::new(&conn).unwrap().count(&Filter::True).unwrap();
    (String::from_utf8(out).unwrap(), remaining)
}

#[test]
fn every_step_prints_a_banner() {
    let (text, _) = scenario_output("scratch-banners");
    assert_eq!(text.matches("\x1b[36m").count(), 25);
    assert!(text.contains("Find the notes with _id between 9 and 17 inclusive"));
}

#[test]
fn scenario_leaves_nine_notes() {
    let (_, remaining) = scenario_output("scratch-remaining");
    assert_eq!(remaining, 9);
}

#[test]
fn write_summaries_match_the_fixture() {
    let (text, _) = scenario_output("scratch-summaries");
    for expected in [
        r#"{"acknowledged":true,"matchedCount":9,"modifiedCount":9}"#,
        r#"{"acknowledged":true,"matchedCount":6,"modifiedCount":6}"#,
        r#"{"acknowledged":true,"matchedCount":3,"modifiedCount":3}"#,
        r#"{"acknowledged":true,"deletedCount":6}"#,
        r#"{"acknowledged":true,"deletedCount":2}"#,
        r#"{"acknowledged":true,"deletedCount":5}"#,
    ] {
        assert!(text.contains(expected), "missing {expected}");
    }
}

#[test]
fn read_steps_render_documents() {
    let (text, _) = scenario_output("scratch-reads");
    assert!(text.contains("{ _id: 000000000000000000000001, title: '5 life lessons learned from cats', content: "));
    assert!(text.contains("{ _id: 000000000000000000000001, title: '5 life lessons learned from cats' }\n"));
    assert!(text.contains("\n20\n"));
    assert!(text.contains("{ _id: 000000000000000000000008, content: "));
}
