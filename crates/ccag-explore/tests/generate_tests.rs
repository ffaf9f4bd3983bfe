use ccag_explore::tabu::{bracket_search, Attempt};
use ccag_explore::{
    generate, Aetg, AetgConfig, GenerateError, Generation, GenerationStatus, SearchLimits,
    StopReason, TabuConfig, TabuSearch,
};
use ccag_handler::{ConstraintHandler, HandlerKind};
use ccag_model::{Clause, CoverageModel, TestModel};

fn binary3() -> TestModel {
    TestModel::new("binary3", 2, vec![2, 2, 2])
}

/// `p0 = 0, p1 = 0` and `p2 = 2, p3 = 1` are forbidden.
fn constrained() -> TestModel {
    TestModel::new("constrained", 2, vec![2, 3, 3, 2])
        .with_constraints(vec![Clause(vec![-1, -3]), Clause(vec![-8, -10])])
}

/// Replay the suite into a fresh model, pruned with the Verify checker, and
/// return the number of valid combinations left uncovered.
fn uncovered_after_replay(spec: &TestModel, generation: &Generation) -> u64 {
    let mut model = CoverageModel::new(spec.clone()).unwrap();
    model.initialize().unwrap();
    let mut verify = HandlerKind::Verify.build();
    verify.pre(&mut model).unwrap();
    model.prune_invalid(|t| verify.is_valid(t));

    for row in generation.suite.iter() {
        assert!(row.iter().all(Option::is_some), "incomplete row {row:?}");
        assert!(verify.is_valid(row), "invalid row {row:?}");
        model.mark_covered(row);
    }
    model.uncovered()
}

#[test]
fn test_greedy_covers_all_pairs_of_binary_model() {
    let spec = binary3();
    let generation = generate(&Aetg::default(), spec.clone(), HandlerKind::Verify, 7).unwrap();
    assert_eq!(generation.status, GenerationStatus::Complete);
    assert!(generation.size >= 4);
    assert_eq!(generation.size, generation.suite.len());
    assert_eq!(uncovered_after_replay(&spec, &generation), 0);
}

#[test]
fn test_greedy_is_reproducible() {
    let a = generate(&Aetg::default(), constrained(), HandlerKind::Verify, 11).unwrap();
    let b = generate(&Aetg::default(), constrained(), HandlerKind::Verify, 11).unwrap();
    assert_eq!(a.suite, b.suite);
}

#[test]
fn test_greedy_with_every_supported_handler() {
    let spec = constrained();
    let aetg = Aetg::new(AetgConfig {
        candidates: 20,
        ..Default::default()
    });
    for kind in [HandlerKind::Verify, HandlerKind::Solver, HandlerKind::Replace] {
        let generation = generate(&aetg, spec.clone(), kind, 3).unwrap();
        assert!(generation.status.is_complete(), "{kind}");
        assert_eq!(uncovered_after_replay(&spec, &generation), 0, "{kind}");
    }
}

#[test]
fn test_greedy_rejects_tolerate() {
    let err = generate(&Aetg::default(), binary3(), HandlerKind::Tolerate, 0).unwrap_err();
    assert!(matches!(
        err,
        GenerateError::UnsupportedHandler {
            generator: "aetg",
            handler: HandlerKind::Tolerate
        }
    ));
}

#[test]
fn test_tabu_builds_minimal_binary_covering_array() {
    let spec = binary3();
    let generation = generate(&TabuSearch::default(), spec.clone(), HandlerKind::Verify, 5).unwrap();
    assert_eq!(generation.status, GenerationStatus::Complete);
    assert_eq!(generation.size, 4);
    assert_eq!(uncovered_after_replay(&spec, &generation), 0);
}

#[test]
fn test_tabu_with_every_handler() {
    let spec = constrained();
    for kind in HandlerKind::ALL {
        let generation = generate(&TabuSearch::default(), spec.clone(), kind, 21).unwrap();
        assert!(generation.status.is_complete(), "{kind}");
        assert_eq!(uncovered_after_replay(&spec, &generation), 0, "{kind}");
    }
}

#[test]
fn test_tabu_reports_exhausted_budget() {
    let search = TabuSearch::new(TabuConfig {
        limits: SearchLimits {
            max_wall_secs: 0,
            ..Default::default()
        },
        ..Default::default()
    });
    let generation = generate(&search, binary3(), HandlerKind::Verify, 1).unwrap();
    assert_eq!(
        generation.status,
        GenerationStatus::Exhausted {
            reason: StopReason::WallTimeExceeded
        }
    );
    assert!(generation.suite.is_empty());
}

#[test]
fn test_bracket_search_never_retries_above_success() {
    let mut tried = Vec::new();
    let (found, _) = bracket_search(4, 40, |n| {
        tried.push(n);
        if n >= 9 {
            Attempt::Found(n)
        } else {
            Attempt::Failed
        }
    });
    assert_eq!(found, Some(9));

    for (i, &n) in tried.iter().enumerate() {
        if n >= 9 {
            assert!(tried[i + 1..].iter().all(|&later| later < n), "{tried:?}");
        }
    }
}

#[test]
fn test_generation_report_serializes() {
    let generation = generate(&Aetg::default(), binary3(), HandlerKind::Solver, 2).unwrap();
    let json = serde_json::to_value(&generation).unwrap();
    assert_eq!(json["generator"], "aetg");
    assert_eq!(json["handler"], "solver");
    assert_eq!(json["status"], "Complete");
    assert_eq!(json["size"].as_u64(), Some(generation.size as u64));
}
