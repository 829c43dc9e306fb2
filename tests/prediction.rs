mod common;

use common::{drain, history, setup, FakeBackend, FakeModel};
use tiered_predictor::{notify::Severity, prediction::Tier, ModelKind, PredictorConfig};

#[test]
fn sequence_tier_wins_when_available() {
    let backend = FakeBackend::new();
    let (predictor, _rx) = setup(&backend, PredictorConfig::default());

    predictor
        .registry()
        .set(ModelKind::Sequence, FakeModel::answering(ModelKind::Sequence, 4. / 9.));
    predictor.registry().set(
        ModelKind::Feedforward,
        FakeModel::answering(ModelKind::Feedforward, 1. / 9.),
    );

    let prediction = predictor.predict(&history(&[], 2000));
    assert_eq!(prediction.tier, Tier::Sequence);
    assert_eq!(prediction.digit.value(), 4);

    // Below the sequence threshold the feedforward model answers
    let prediction = predictor.predict(&history(&[], 1999));
    assert_eq!(prediction.tier, Tier::Feedforward);
    assert_eq!(prediction.digit.value(), 1);
}

#[test]
fn sequence_input_is_the_ten_newest_observations_normalized() {
    let backend = FakeBackend::new();
    let (predictor, _rx) = setup(&backend, PredictorConfig::default());
    predictor
        .registry()
        .set(ModelKind::Sequence, FakeModel::answering(ModelKind::Sequence, 0.));

    predictor.predict(&history(&[9, 0, 3], 2000));

    let inputs = backend.inputs.lock();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].len(), 10);
    assert_eq!(&inputs[0][..3], &[1., 0., 3. / 9.]);
}

#[test]
fn every_state_answers_a_digit() {
    let outputs = [-3., -0.01, 0., 0.5, 0.97, 1.2, 50.];
    let volumes = [0, 1, 9, 10, 49, 50, 1999, 2000, 2100];

    for output in outputs {
        for (sequence, feedforward) in [(false, false), (true, false), (false, true), (true, true)] {
            let backend = FakeBackend::new();
            let (predictor, _rx) = setup(&backend, PredictorConfig::default());

            if sequence {
                predictor.registry().set(
                    ModelKind::Sequence,
                    FakeModel::answering(ModelKind::Sequence, output),
                );
            }
            if feedforward {
                predictor.registry().set(
                    ModelKind::Feedforward,
                    FakeModel::answering(ModelKind::Feedforward, output),
                );
            }

            for volume in volumes {
                let digit = predictor.predict(&history(&[], volume)).digit.value();
                assert!(digit <= 9, "{output} {volume} gave {digit}");
            }
        }
    }
}

#[test]
fn rule_based_sums_the_two_newest() {
    let backend = FakeBackend::new();
    let (predictor, mut rx) = setup(&backend, PredictorConfig::default());

    let prediction = predictor.predict(&history(&[7, 3], 10));
    assert_eq!(prediction.tier, Tier::RuleBased);
    assert_eq!(prediction.digit.value(), 0);

    let notifications = drain(&mut rx);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].message, "Using Rule-Based Prediction...");
    assert_eq!(notifications[0].severity, Severity::Warning);
}

#[test]
fn short_histories_get_a_random_digit() {
    let backend = FakeBackend::new();
    let (predictor, _rx) = setup(&backend, PredictorConfig::default());

    for volume in [0, 1, 9] {
        for _ in 0..200 {
            let prediction = predictor.predict(&history(&[7, 3], volume));
            assert_eq!(prediction.tier, Tier::RuleBased);
            assert!(prediction.digit.value() <= 9);
        }
    }
}

#[test]
fn a_failing_sequence_model_falls_back_to_feedforward() {
    let backend = FakeBackend::new();
    let (predictor, mut rx) = setup(&backend, PredictorConfig::default());
    predictor
        .registry()
        .set(ModelKind::Sequence, FakeModel::failing(ModelKind::Sequence));
    predictor.registry().set(
        ModelKind::Feedforward,
        FakeModel::answering(ModelKind::Feedforward, 6. / 9.),
    );

    let prediction = predictor.predict(&history(&[], 2000));
    assert_eq!(prediction.tier, Tier::Feedforward);
    assert_eq!(prediction.digit.value(), 6);

    let messages: Vec<String> = drain(&mut rx).into_iter().map(|n| n.message).collect();
    assert_eq!(
        messages,
        vec![
            "Using LSTM AI Model...",
            "LSTM model failed, falling back.",
            "Using Feedforward AI Model...",
        ]
    );
}

#[test]
fn failing_models_fall_back_to_the_rules() {
    let backend = FakeBackend::new();
    let (predictor, _rx) = setup(&backend, PredictorConfig::default());
    predictor
        .registry()
        .set(ModelKind::Sequence, FakeModel::failing(ModelKind::Sequence));
    predictor.registry().set(
        ModelKind::Feedforward,
        FakeModel::answering(ModelKind::Feedforward, f32::NAN),
    );

    let prediction = predictor.predict(&history(&[4, 4], 2000));
    assert_eq!(prediction.tier, Tier::RuleBased);
    assert_eq!(prediction.digit.value(), 8);
}

#[test]
fn outputs_are_clamped_into_the_digit_range() {
    let backend = FakeBackend::new();
    let (predictor, _rx) = setup(&backend, PredictorConfig::default());
    predictor.registry().set(
        ModelKind::Feedforward,
        FakeModel::answering(ModelKind::Feedforward, 1.4),
    );

    let prediction = predictor.predict(&history(&[], 50));
    assert_eq!(prediction.tier, Tier::Feedforward);
    assert_eq!(prediction.digit.value(), 9);
}

#[test]
fn without_clamping_out_of_range_outputs_fall_back() {
    let backend = FakeBackend::new();
    let config = PredictorConfig {
        clamp_output: false,
        ..PredictorConfig::default()
    };
    let (predictor, _rx) = setup(&backend, config);
    predictor.registry().set(
        ModelKind::Feedforward,
        FakeModel::answering(ModelKind::Feedforward, -0.5),
    );

    let prediction = predictor.predict(&history(&[2, 5], 50));
    assert_eq!(prediction.tier, Tier::RuleBased);
    assert_eq!(prediction.digit.value(), 7);
}

#[test]
fn halves_round_away_from_zero() {
    let backend = FakeBackend::new();
    let (predictor, _rx) = setup(&backend, PredictorConfig::default());
    predictor.registry().set(
        ModelKind::Feedforward,
        FakeModel::answering(ModelKind::Feedforward, 0.5),
    );

    assert_eq!(predictor.predict(&history(&[], 50)).digit.value(), 5);
}
