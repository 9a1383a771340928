//! End-to-end pipeline tests
//!
//! Fixtures are noise-free 3 second recordings at 100 Hz whose magnitude
//! channel carries a pure 2 Hz ("walk") or 4 Hz ("run") sinusoid.

#[cfg(test)]
mod end_to_end_tests {
    use crate::classifier::{ModelKind, ModelSpec};
    use crate::error::MotionError;
    use crate::features::FeatureConfig;
    use crate::models::{AccelRecord, LabelSet, RawSample};
    use crate::pipeline::{
        InferenceOrchestrator, InferenceRequest, TrainingOrchestrator, TrainingRequest,
    };
    use crate::progress::{progress_channel, ProgressEvent};
    use std::f64::consts::PI;
    use std::sync::Arc;

    const SAMPLES_PER_LABEL: usize = 10;
    const RECORDS: usize = 300;

    fn recording(freq: f64, phase: f64) -> RawSample {
        (0..RECORDS)
            .map(|i| {
                let t = i as f64 / 100.0;
                AccelRecord::new(0.0, 0.0, 0.0, 1.0 + 0.5 * (2.0 * PI * freq * t + phase).sin())
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn training_set() -> Vec<RawSample> {
        let mut samples = Vec::new();
        for i in 0..SAMPLES_PER_LABEL {
            samples.push(recording(2.0, i as f64 * 0.1));
        }
        for i in 0..SAMPLES_PER_LABEL {
            samples.push(recording(4.0, i as f64 * 0.1));
        }
        samples
    }

    fn request(kind: &str, params: &[f64]) -> TrainingRequest {
        let kind: ModelKind = kind.parse().unwrap();
        TrainingRequest {
            job_id: "test-job".to_string(),
            samples: training_set(),
            labels: LabelSet::new(["walk", "run"]),
            samples_per_label: SAMPLES_PER_LABEL,
            model: ModelSpec::from_values(kind, params).unwrap(),
            features: FeatureConfig::default(),
        }
    }

    fn messages(events: &[ProgressEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Message(m) => Some(m.clone()),
                ProgressEvent::Done => None,
            })
            .collect()
    }

    #[test]
    fn test_direct_fit_recovers_held_out_labels() {
        let orchestrator = TrainingOrchestrator::new();
        let (tx, _rx) = progress_channel();
        let trained = orchestrator.train(&request("KNN", &[0.2, 3.0]), tx).unwrap();
        assert_eq!(trained.encoder.classes(), &["run".to_string(), "walk".to_string()]);

        let held_out = vec![
            recording(2.0, 1.3),
            recording(4.0, 0.7),
            recording(2.0, 2.9),
            recording(4.0, 2.2),
        ];
        let predictions = InferenceOrchestrator::new()
            .predict(&held_out, &trained.model, &trained.encoder, &trained.features)
            .unwrap();
        assert_eq!(predictions, vec!["walk", "run", "walk", "run"]);
    }

    #[test]
    fn test_svm_recovers_held_out_labels() {
        let orchestrator = TrainingOrchestrator::new();
        let (tx, _rx) = progress_channel();
        let trained = orchestrator.train(&request("svm", &[0.25, 1.0]), tx).unwrap();

        let held_out = vec![recording(4.0, 0.4), recording(2.0, 0.9)];
        let predictions = InferenceOrchestrator::new()
            .predict(&held_out, &trained.model, &trained.encoder, &trained.features)
            .unwrap();
        assert_eq!(predictions, vec!["run", "walk"]);
    }

    #[test]
    fn test_direct_fit_emits_one_message_then_sentinel() {
        let orchestrator = TrainingOrchestrator::new();
        let (tx, mut rx) = progress_channel();
        orchestrator.train(&request("KNN", &[0.2, 3.0]), tx).unwrap();

        let events = rx.try_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], ProgressEvent::Done);
        let text = &messages(&events)[0];
        assert!(text.starts_with("KNN accuracy: "), "{}", text);
        assert!(text.ends_with('%'), "{}", text);
    }

    #[test]
    fn test_iterative_emits_every_tenth_epoch() {
        let orchestrator = TrainingOrchestrator::new();
        let (tx, mut rx) = progress_channel();
        orchestrator
            .train(&request("GRU", &[0.2, 32.0, 0.01, 25.0]), tx)
            .unwrap();

        let events = rx.try_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events.last(), Some(&ProgressEvent::Done));
        let texts = messages(&events);
        assert!(texts[0].starts_with("Epoch [10/25], Training Loss: "), "{}", texts[0]);
        assert!(texts[1].starts_with("Epoch [20/25], Training Loss: "), "{}", texts[1]);
        assert!(texts[1].contains("Validation Loss: "));
    }

    #[test]
    fn test_iterative_below_ten_epochs_is_silent() {
        let orchestrator = TrainingOrchestrator::new();
        let (tx, mut rx) = progress_channel();
        orchestrator
            .train(&request("RNN", &[0.2, 64.0, 0.01, 9.0]), tx)
            .unwrap();
        assert_eq!(rx.try_events(), vec![ProgressEvent::Done]);
    }

    #[test]
    fn test_unknown_model_kind_is_configuration_error() {
        assert!(matches!(
            "LSTM".parse::<ModelKind>(),
            Err(MotionError::Configuration(_))
        ));
    }

    #[test]
    fn test_failure_message_precedes_sentinel() {
        let mut req = request("KNN", &[0.2, 3.0]);
        req.samples = vec![RawSample::default(); 2 * SAMPLES_PER_LABEL];

        let (tx, mut rx) = progress_channel();
        let result = TrainingOrchestrator::new().train(&req, tx);
        assert!(matches!(result, Err(MotionError::InsufficientData(_))));

        let events = rx.try_events();
        assert_eq!(events.len(), 2);
        match &events[0] {
            ProgressEvent::Message(m) => assert!(m.starts_with("error: insufficient data")),
            other => panic!("expected failure message, got {:?}", other),
        }
        assert_eq!(events[1], ProgressEvent::Done);
    }

    #[test]
    fn test_short_samples_are_skipped() {
        let mut req = request("KNN", &[0.2, 1.0]);
        req.samples[3] = RawSample::default();
        req.samples[15] = RawSample::new(vec![AccelRecord::default(); 5]);

        let (tx, _rx) = progress_channel();
        let trained = TrainingOrchestrator::new().train(&req, tx).unwrap();
        assert_eq!(trained.encoder.num_classes(), 2);
    }

    #[test]
    fn test_mismatched_sample_count_is_rejected() {
        let mut req = request("KNN", &[0.2, 3.0]);
        req.samples.pop();
        assert!(matches!(req.validate(), Err(MotionError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_length_test_sample_fails_with_empty_window_set() {
        let (tx, _rx) = progress_channel();
        let trained = TrainingOrchestrator::new()
            .train(&request("KNN", &[0.2, 3.0]), tx)
            .unwrap();

        let samples = vec![recording(2.0, 0.0), RawSample::default()];
        let result = InferenceOrchestrator::new().predict(
            &samples,
            &trained.model,
            &trained.encoder,
            &trained.features,
        );
        assert!(matches!(
            result,
            Err(MotionError::EmptyWindowSet { index: 1, len: 0, .. })
        ));
    }

    #[test]
    fn test_prediction_preserves_order_and_length() {
        let (tx, _rx) = progress_channel();
        let trained = TrainingOrchestrator::new()
            .train(&request("KNN", &[0.2, 3.0]), tx)
            .unwrap();

        let pattern = [4.0, 2.0, 2.0, 4.0, 2.0];
        let samples: Vec<RawSample> = pattern.iter().map(|&f| recording(f, 0.5)).collect();
        let predictions = InferenceOrchestrator::new()
            .predict(&samples, &trained.model, &trained.encoder, &trained.features)
            .unwrap();

        assert_eq!(predictions.len(), samples.len());
        let expected: Vec<&str> = pattern
            .iter()
            .map(|&f| if f == 2.0 { "walk" } else { "run" })
            .collect();
        assert_eq!(predictions, expected);
    }

    #[tokio::test]
    async fn test_spawned_training_streams_until_sentinel() {
        let orchestrator = Arc::new(TrainingOrchestrator::new());
        let (rx, handle) = orchestrator
            .spawn_training(request("RNN", &[0.2, 32.0, 0.01, 20.0]))
            .unwrap();

        let streamed = rx.collect().await;
        let trained = handle.await.unwrap().unwrap();
        assert_eq!(streamed.len(), 2);
        assert!(streamed[1].starts_with("Epoch [20/20]"));
        assert_eq!(trained.model.kind(), ModelKind::Rnn);
    }

    #[tokio::test]
    async fn test_spawn_rejects_bad_request_synchronously() {
        let mut req = request("KNN", &[0.2, 3.0]);
        req.labels = LabelSet::new(["walk", "run", "jump"]);
        let result = Arc::new(TrainingOrchestrator::new()).spawn_training(req);
        assert!(matches!(result, Err(MotionError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_spawned_inference_streams_predictions() {
        let (tx, _rx) = progress_channel();
        let trained = TrainingOrchestrator::new()
            .train(&request("KNN", &[0.2, 3.0]), tx)
            .unwrap();

        let inference = Arc::new(InferenceOrchestrator::new());
        let (rx, handle) = inference
            .spawn_inference(
                InferenceRequest {
                    job_id: "test-job".to_string(),
                    samples: vec![recording(4.0, 0.2), recording(2.0, 0.2)],
                    expected_labels: Some(LabelSet::new(["walk", "run"])),
                },
                Arc::new(trained),
            )
            .unwrap();

        let streamed = rx.collect().await;
        assert_eq!(streamed, vec!["sample 0: predicted run", "sample 1: predicted walk"]);
        assert_eq!(handle.await.unwrap().unwrap(), vec!["run", "walk"]);
    }

    #[tokio::test]
    async fn test_spawned_inference_reports_failure_then_sentinel() {
        let (tx, _rx) = progress_channel();
        let trained = TrainingOrchestrator::new()
            .train(&request("KNN", &[0.2, 3.0]), tx)
            .unwrap();

        let (rx, handle) = Arc::new(InferenceOrchestrator::new())
            .spawn_inference(
                InferenceRequest {
                    job_id: "test-job".to_string(),
                    samples: vec![recording(2.0, 0.0), RawSample::default()],
                    expected_labels: None,
                },
                Arc::new(trained),
            )
            .unwrap();

        let streamed = rx.collect().await;
        assert_eq!(streamed.len(), 2);
        assert_eq!(streamed[0], "sample 0: predicted walk");
        assert!(streamed[1].starts_with("error: sample 1 yields no full window"));
        assert!(handle.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_unknown_vocabulary_is_rejected_before_inference() {
        let (tx, _rx) = progress_channel();
        let trained = TrainingOrchestrator::new()
            .train(&request("KNN", &[0.2, 3.0]), tx)
            .unwrap();

        let result = Arc::new(InferenceOrchestrator::new()).spawn_inference(
            InferenceRequest {
                job_id: "test-job".to_string(),
                samples: vec![recording(2.0, 0.0)],
                expected_labels: Some(LabelSet::new(["walk", "swim"])),
            },
            Arc::new(trained),
        );
        assert!(matches!(result, Err(MotionError::Configuration(_))));
    }
}
