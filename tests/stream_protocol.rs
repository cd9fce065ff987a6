use sukashi::stream::{Action, Frame, SessionError, SessionLimits, StreamSession};

fn open_session() -> StreamSession {
    StreamSession::new(SessionLimits {
        max_upload_size: 10 * 1024,
        api_token: None,
    })
}

fn header(filename: &str, size: u64, chunks: u32) -> Frame {
    Frame::Text(
        serde_json::json!({
            "filename": filename,
            "size": size,
            "chunks": chunks,
        })
        .to_string(),
    )
}

fn drive_transfer(session: &mut StreamSession, filename: &str, payload: &[u8], chunk_size: usize) {
    let chunks = payload.len().div_ceil(chunk_size) as u32;
    session
        .on_frame(header(filename, payload.len() as u64, chunks))
        .unwrap();

    let mut delivered = None;
    for chunk in payload.chunks(chunk_size) {
        let actions = session.on_frame(Frame::Binary(chunk.to_vec())).unwrap();
        for action in actions {
            match action {
                Action::Ack(ack) => assert!(ack.chunk_received),
                Action::Process(file) => delivered = Some(file),
                other => panic!("unexpected action during upload: {:?}", other),
            }
        }
    }

    let file = delivered.expect("transfer should complete");
    assert_eq!(file.filename, filename);
    assert_eq!(file.data, payload);
}

#[test]
fn two_files_flow_through_one_connection() {
    let mut session = open_session();

    drive_transfer(&mut session, "first.jpg", &vec![1u8; 2000], 512);
    let actions = session.on_result(Ok(vec![0xAA; 100]));
    assert_eq!(actions.len(), 2);
    assert!(matches!(actions[0], Action::Result(ref r) if r.success));
    assert!(matches!(actions[1], Action::Output(_)));

    // Same connection, next header.
    drive_transfer(&mut session, "second.png", &vec![2u8; 777], 256);
    let actions = session.on_result(Ok(vec![0xBB; 50]));
    match &actions[0] {
        Action::Result(result) => {
            assert_eq!(
                result.output_filename.as_deref(),
                Some("watermarked_second.png")
            );
            assert_eq!(result.output_size, Some(50));
        }
        other => panic!("expected Result, got {:?}", other),
    }
}

#[test]
fn processing_failure_keeps_the_connection_usable() {
    let mut session = open_session();

    drive_transfer(&mut session, "broken.jpg", &[0u8; 64], 64);
    let actions = session.on_result(Err("unsupported image format".to_string()));
    assert_eq!(actions.len(), 1);
    match &actions[0] {
        Action::Result(result) => {
            assert!(!result.success);
            assert!(result.message.contains("unsupported"));
            assert!(result.output_filename.is_none());
        }
        other => panic!("expected Result, got {:?}", other),
    }

    assert!(!session.is_closed());
    drive_transfer(&mut session, "retry.jpg", &[3u8; 128], 128);
}

#[test]
fn acks_count_every_chunk_except_the_last() {
    let mut session = open_session();
    let payload = vec![9u8; 1000];
    session.on_frame(header("a.jpg", 1000, 4)).unwrap();

    let mut acks = Vec::new();
    for chunk in payload.chunks(250) {
        let actions = session.on_frame(Frame::Binary(chunk.to_vec())).unwrap();
        for action in actions {
            if let Action::Ack(ack) = action {
                acks.push(ack.index);
            }
        }
    }

    // Four chunks, three acks: the completing chunk is answered by the
    // result instead.
    assert_eq!(acks, vec![1, 2, 3]);
}

#[test]
fn single_chunk_upload_never_sees_an_ack() {
    let mut session = open_session();
    session.on_frame(header("a.jpg", 100, 1)).unwrap();
    let actions = session.on_frame(Frame::Binary(vec![0u8; 100])).unwrap();
    assert!(actions.iter().all(|a| !matches!(a, Action::Ack(_))));
}

#[test]
fn header_while_processing_is_rejected() {
    let mut session = open_session();
    drive_transfer(&mut session, "a.jpg", &[1u8; 10], 10);

    // The pipeline has not reported back yet; any frame is a violation.
    let err = session.on_frame(header("b.jpg", 10, 1)).unwrap_err();
    assert!(matches!(err, SessionError::Protocol(_)));
    assert!(session.is_closed());
}

#[test]
fn oversized_and_unauthorized_rejections_carry_a_result_frame() {
    let mut session = open_session();
    let err = session
        .on_frame(header("huge.jpg", 100 * 1024, 1))
        .unwrap_err();
    assert!(matches!(err, SessionError::PayloadTooLarge { .. }));
    assert!(err.wants_result_frame());

    let mut session = StreamSession::new(SessionLimits {
        max_upload_size: 10 * 1024,
        api_token: Some("secret".to_string()),
    });
    let err = session
        .on_frame(Frame::Text(
            serde_json::json!({"filename": "a.jpg", "size": 10}).to_string(),
        ))
        .unwrap_err();
    assert!(matches!(err, SessionError::Unauthorized));
    assert!(err.wants_result_frame());
}

#[test]
fn byte_overrun_closes_without_a_result_frame() {
    let mut session = open_session();
    session.on_frame(header("a.jpg", 100, 1)).unwrap();
    let err = session.on_frame(Frame::Binary(vec![0u8; 101])).unwrap_err();
    assert!(matches!(err, SessionError::Protocol(_)));
    assert!(!err.wants_result_frame());
}

#[test]
fn wire_schemas_serialize_as_documented() {
    let mut session = open_session();
    session.on_frame(header("photo.jpg", 4, 2)).unwrap();
    let actions = session.on_frame(Frame::Binary(vec![1, 2])).unwrap();
    let Action::Ack(ack) = &actions[0] else {
        panic!("expected ack");
    };
    let json = serde_json::to_value(ack).unwrap();
    assert_eq!(json, serde_json::json!({"chunk_received": true, "index": 1}));

    session.on_frame(Frame::Binary(vec![3, 4])).unwrap();
    let actions = session.on_result(Ok(vec![5, 6, 7]));
    let Action::Result(result) = &actions[0] else {
        panic!("expected result");
    };
    let json = serde_json::to_value(result).unwrap();
    assert_eq!(json["success"], serde_json::json!(true));
    assert_eq!(json["output_size"], serde_json::json!(3));
    assert_eq!(
        json["output_filename"],
        serde_json::json!("watermarked_photo.jpg")
    );
    assert!(json["timestamp"].is_string());
}
