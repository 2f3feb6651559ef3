//! JSON round trips against a truck-backed session.

#![cfg(feature = "truck")]

use serde_json::{json, Value};
use uuid::Uuid;
use worker_bridge::*;

fn send(session: &mut Session, request: Value) -> Value {
    let out = dispatch_json(session, &request.to_string());
    serde_json::from_str(&out).unwrap()
}

fn shape_id(response: &Value) -> Uuid {
    assert_eq!(response["type"], "Shape", "{response}");
    serde_json::from_value(response["id"].clone()).unwrap()
}

#[test]
fn box_then_tessellate_over_json() {
    let mut session = Session::truck();
    assert_eq!(session.ctx.kernel().name(), "truck");
    let created = send(
        &mut session,
        json!({"type": "MakeBox", "width": 2, "length": 2, "height": 2}),
    );
    let id = shape_id(&created);

    let meshed = send(
        &mut session,
        json!({"type": "Tessellate", "shape": id, "maxDeviation": 0.1}),
    );
    assert_eq!(meshed["type"], "Mesh", "{meshed}");
    assert_eq!(meshed["mesh"]["faceList"].as_array().unwrap().len(), 6);
    assert!(meshed["mesh"]["edgeList"].as_array().unwrap().is_empty());
    assert_eq!(session.ctx.live_shapes(), 1);
}

#[test]
fn union_and_transform_of_disjoint_boxes() {
    let mut session = Session::truck();
    let a = shape_id(&send(
        &mut session,
        json!({"type": "MakeBox", "width": 1, "length": 1, "height": 1}),
    ));
    let b = shape_id(&send(
        &mut session,
        json!({"type": "MakeBox", "width": 1, "length": 1, "height": 1, "center": [4, 0, 0]}),
    ));

    let union = send(&mut session, json!({"type": "Union", "shapes": [a, b]}));
    assert_eq!(union["kind"], json!(shape_types::ShapeKind::Compound));

    let moved = shape_id(&send(
        &mut session,
        json!({"type": "Transform", "shape": a, "translation": [0, 0, 10], "scaleFactor": 2}),
    ));
    let bbox = session
        .ctx
        .query()
        .bounding_box(session.shapes.get(&moved).unwrap())
        .unwrap();
    assert!((bbox.size()[2] - 2.0).abs() < 1e-9);
    assert!((bbox.center()[2] - 10.0).abs() < 1e-9);
    assert_eq!(session.shapes.len(), 4);
}

#[test]
fn unsupported_operations_come_back_as_errors() {
    let mut session = Session::truck();
    let id = shape_id(&send(
        &mut session,
        json!({"type": "MakeBox", "width": 1, "length": 1, "height": 1}),
    ));
    let response = send(
        &mut session,
        json!({"type": "Fillet", "shape": id, "radius": 0.1}),
    );
    assert_eq!(response["type"], "Error");
    assert_eq!(response["operation"], "Fillet");

    let response = send(
        &mut session,
        json!({"type": "Import", "fileName": "part.step", "fileText": "ISO-10303-21;"}),
    );
    assert_eq!(response["type"], "Error");
    assert_eq!(session.shapes.len(), 1);
}
