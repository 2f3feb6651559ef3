use serde_json::{json, Value};
use uuid::Uuid;
use worker_bridge::*;

// ── Helper functions ─────────────────────────────────────────────────────

/// Sends a JSON request through the string entry point.
fn send(session: &mut Session, request: Value) -> Value {
    let out = dispatch_json(session, &request.to_string());
    serde_json::from_str(&out).unwrap()
}

fn make_box(session: &mut Session, size: f64, center: [f64; 3]) -> Uuid {
    match dispatch(
        session,
        Request::MakeBox {
            width: size,
            length: size,
            height: size,
            center,
        },
    ) {
        Response::Shape { id, .. } => id,
        other => panic!("expected a shape, got {other:?}"),
    }
}

fn error_of(response: Response) -> (String, Option<String>) {
    match response {
        Response::Error { message, operation } => (message, operation),
        other => panic!("expected an error, got {other:?}"),
    }
}

// ── Primitives and meshing ───────────────────────────────────────────────

#[test]
fn box_then_tessellate_over_json() {
    let mut session = Session::mock();
    let created = send(
        &mut session,
        json!({"type": "MakeBox", "width": 2, "length": 2, "height": 2}),
    );
    assert_eq!(created["type"], "Shape");
    assert_eq!(created["kind"], json!(shape_types::ShapeKind::Solid));
    let id = created["id"].as_str().unwrap().to_string();

    let meshed = send(
        &mut session,
        json!({"type": "Tessellate", "shape": id, "maxDeviation": 0.1}),
    );
    assert_eq!(meshed["type"], "Mesh");
    let faces = meshed["mesh"]["faceList"].as_array().unwrap();
    assert_eq!(faces.len(), 6);
    assert!(meshed["mesh"]["edgeList"].as_array().unwrap().is_empty());

    // Meshing leaves only the registered box alive.
    assert_eq!(session.ctx.live_shapes(), 1);
    assert_eq!(session.shapes.len(), 1);
}

#[test]
fn every_primitive_request_registers_a_shape() {
    let mut session = Session::mock();
    let requests = [
        json!({"type": "MakeSphere", "center": [1, 2, 3], "radius": 1.5}),
        json!({"type": "MakeCylinder", "radius": 1, "height": 2}),
        json!({"type": "MakeCone", "bottomRadius": 2, "topRadius": 1, "height": 3}),
    ];
    for request in requests {
        let response = send(&mut session, request);
        assert_eq!(response["type"], "Shape", "{response}");
    }
    assert_eq!(session.shapes.len(), 3);
    assert_eq!(session.ctx.live_shapes(), 3);
}

// ── Errors ───────────────────────────────────────────────────────────────

#[test]
fn unknown_shape_id_is_reported_with_operation() {
    let mut session = Session::mock();
    let missing = Uuid::new_v4();
    let (message, operation) = error_of(dispatch(
        &mut session,
        Request::Tessellate {
            shape: missing,
            max_deviation: None,
            adjust_y_to_z: false,
        },
    ));
    assert!(message.contains(&missing.to_string()));
    assert_eq!(operation.as_deref(), Some("Tessellate"));
}

#[test]
fn invalid_dimensions_come_back_as_errors() {
    let mut session = Session::mock();
    let response = send(
        &mut session,
        json!({"type": "MakeBox", "width": 0, "length": 1, "height": 1}),
    );
    assert_eq!(response["type"], "Error");
    assert_eq!(response["operation"], "MakeBox");
    assert_eq!(session.ctx.live_shapes(), 0);
}

#[test]
fn unsupported_import_extension() {
    let mut session = Session::mock();
    let (message, operation) = error_of(dispatch(
        &mut session,
        Request::Import {
            file_name: "part.obj".into(),
            file_text: String::new(),
        },
    ));
    assert!(message.contains("unsupported file type"), "{message}");
    assert_eq!(operation.as_deref(), Some("Import"));
}

#[test]
fn fillet_size_list_mismatch() {
    let mut session = Session::mock();
    let id = make_box(&mut session, 2.0, [0.0; 3]);
    let (message, operation) = error_of(dispatch(
        &mut session,
        Request::Fillet {
            shape: id,
            radius: None,
            radius_list: Some(vec![0.1, 0.2, 0.3]),
            edge_index_list: Some(vec![0, 1]),
        },
    ));
    assert!(message.contains("expected 2"), "{message}");
    assert_eq!(operation.as_deref(), Some("Fillet"));
    assert_eq!(session.ctx.live_shapes(), 1);
}

#[test]
fn chamfer_needs_a_distance() {
    let mut session = Session::mock();
    let id = make_box(&mut session, 2.0, [0.0; 3]);
    let (message, _) = error_of(dispatch(
        &mut session,
        Request::Chamfer {
            shape: id,
            distance: None,
            distance_list: None,
            edge_index_list: None,
        },
    ));
    assert!(message.contains("distance"), "{message}");
}

// ── Modeling round trips ─────────────────────────────────────────────────

#[test]
fn union_fillet_and_transform() {
    let mut session = Session::mock();
    let a = make_box(&mut session, 2.0, [0.0; 3]);
    let b = make_box(&mut session, 2.0, [5.0, 0.0, 0.0]);

    let union = send(&mut session, json!({"type": "Union", "shapes": [a, b]}));
    assert_eq!(union["type"], "Shape");
    assert_eq!(union["kind"], json!(shape_types::ShapeKind::Compound));

    let rounded = dispatch(
        &mut session,
        Request::Fillet {
            shape: a,
            radius: Some(0.2),
            radius_list: None,
            edge_index_list: Some(vec![0, 3]),
        },
    );
    assert!(matches!(rounded, Response::Shape { .. }), "{rounded:?}");

    let moved = send(
        &mut session,
        json!({"type": "Transform", "shape": b, "translation": [0, 0, 10], "scaleFactor": 2}),
    );
    assert_eq!(moved["type"], "Shape");
    let moved: Uuid = serde_json::from_value(moved["id"].clone()).unwrap();
    let bbox = session
        .ctx
        .query()
        .bounding_box(session.shapes.get(&moved).unwrap())
        .unwrap();
    assert!((bbox.size()[2] - 4.0).abs() < 1e-9);
    assert!((bbox.center()[2] - 10.0).abs() < 1e-9);

    assert_eq!(session.shapes.len(), 5);
    assert_eq!(session.ctx.live_shapes(), 5);
}

#[test]
fn difference_of_disjoint_boxes_keeps_the_base() {
    let mut session = Session::mock();
    let base = make_box(&mut session, 2.0, [0.0; 3]);
    let tool = make_box(&mut session, 1.0, [10.0; 3]);
    let response = dispatch(
        &mut session,
        Request::Difference {
            shape: base,
            shapes: vec![tool],
            keep_edges: false,
        },
    );
    let id = match response {
        Response::Shape { id, .. } => id,
        other => panic!("expected a shape, got {other:?}"),
    };
    let volume = session
        .ctx
        .query()
        .volume(session.shapes.get(&id).unwrap())
        .unwrap();
    assert!((volume - 8.0).abs() < 1e-9);
}

#[test]
fn export_step_returns_text() {
    let mut session = Session::mock();
    let id = make_box(&mut session, 1.0, [0.0; 3]);
    let response = dispatch(
        &mut session,
        Request::ExportStep {
            shape: id,
            file_name: "cube.step".into(),
        },
    );
    match response {
        Response::File { text } => assert!(text.starts_with("ISO-10303-21;")),
        other => panic!("expected a file, got {other:?}"),
    }
}

// ── Lifetime ─────────────────────────────────────────────────────────────

#[test]
fn release_and_reset() {
    let mut session = Session::mock();
    let a = make_box(&mut session, 1.0, [0.0; 3]);
    make_box(&mut session, 1.0, [3.0; 3]);
    make_box(&mut session, 1.0, [6.0; 3]);

    assert_eq!(
        dispatch(&mut session, Request::Release { shape: a }),
        Response::Released { id: a }
    );
    assert_eq!(session.ctx.live_shapes(), 2);

    // A released id is gone for good.
    let (_, operation) = error_of(dispatch(&mut session, Request::Release { shape: a }));
    assert_eq!(operation.as_deref(), Some("Release"));

    let reset = send(&mut session, json!({"type": "Reset"}));
    assert_eq!(reset, json!({"type": "Reset", "released": 2}));
    assert_eq!(session.ctx.live_shapes(), 0);
    assert!(session.shapes.is_empty());
}
