#![forbid(unsafe_code)]
use camp_scheduler::io;
use camp_scheduler::model::{Camper, Period, SkillClass};
use camp_scheduler::scheduler::{enroll_campers, AllocOptions};

fn render(f: impl FnOnce(&mut Vec<u8>) -> anyhow::Result<()>) -> String {
    let mut buf = Vec::new();
    f(&mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

#[test]
fn camper_grid_marks_free_periods() {
    let classes = vec![
        SkillClass::new("Tennis", 1, vec![Period::P1, Period::P2, Period::P3]),
        SkillClass::new("Sailing", 1, vec![Period::P1, Period::P2]).double(),
        SkillClass::new("Chess", 1, vec![Period::P3]),
    ];
    let camper = |id: &str, choices: [&str; 2]| {
        Camper::new(id, format!("Camper {id}"), choices.iter().map(|c| c.to_string()).collect())
    };
    let campers = vec![
        camper("1001", ["Sailing", "Tennis"]),
        camper("1002", ["Tennis", "Chess"]),
        camper("1003", ["Chess", "Sailing"]),
    ];
    let opts = AllocOptions {
        viability_multiplier: 0,
        ..AllocOptions::default()
    };
    let outcome = enroll_campers(&campers, &classes, &opts);

    let grid = render(|buf| io::export_camper_assignments(buf, &outcome));
    insta::assert_snapshot!(grid.trim_end(), @r"
    id,P1,P2,P3
    1001,Sailing,Sailing,Tennis
    1002,Tennis,Unassigned,Chess
    1003,Sailing,Sailing,Chess
    ");

    let log = render(|buf| io::export_camper_unassigned(buf, &outcome));
    assert!(log.contains("1002,P2,Sailing,double period needs the next period free"));
    assert!(!log.contains("1001,"));
}
