use shape_ops::ShapeHandle;
use tracing::{debug, warn};

use crate::messages::{Request, Response};
use crate::session::{BridgeError, Session};

/// Dispatch a UI request to the session and return a response.
///
/// Failures never escape: they come back as `Response::Error` tagged with
/// the request's operation name.
pub fn dispatch(session: &mut Session, request: Request) -> Response {
    let operation = request.operation();
    debug!(operation, "dispatching request");
    match handle_request(session, request) {
        Ok(response) => response,
        Err(e) => {
            warn!(operation, error = %e, "request failed");
            Response::Error {
                message: e.to_string(),
                operation: Some(operation.to_string()),
            }
        }
    }
}

/// Parses a JSON request, dispatches it and serializes the response.
pub fn dispatch_json(session: &mut Session, json_input: &str) -> String {
    let response = match serde_json::from_str::<Request>(json_input) {
        Ok(request) => dispatch(session, request),
        Err(e) => Response::Error {
            message: BridgeError::Parse { reason: e.to_string() }.to_string(),
            operation: None,
        },
    };
    to_json(&response)
}

pub(crate) fn to_json(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        format!(r#"{{"type":"Error","message":"serialization failed: {e}","operation":null}}"#)
    })
}

fn handle_request(session: &mut Session, request: Request) -> Result<Response, BridgeError> {
    match request {
        // -- Primitives --
        Request::MakeBox {
            width,
            length,
            height,
            center,
        } => {
            let shape = session.ctx.primitives().make_box(width, length, height, center)?;
            Ok(shape_response(session, shape))
        }

        Request::MakeSphere { center, radius } => {
            let shape = session.ctx.primitives().make_sphere(center, radius)?;
            Ok(shape_response(session, shape))
        }

        Request::MakeCylinder { center, radius, height } => {
            let shape = session.ctx.primitives().make_cylinder(center, radius, height)?;
            Ok(shape_response(session, shape))
        }

        Request::MakeCone {
            center,
            bottom_radius,
            top_radius,
            height,
        } => {
            let shape = session.ctx.primitives().make_cone(center, bottom_radius, top_radius, height)?;
            Ok(shape_response(session, shape))
        }

        // -- Blends --
        Request::Fillet {
            shape,
            radius,
            radius_list,
            edge_index_list,
        } => {
            let uniform = blend_size("radius", radius, radius_list.as_deref())?;
            let target = session.shapes.get(&shape)?;
            let result = session.ctx.fillets().fillet_edges(
                target,
                uniform,
                edge_index_list.as_deref(),
                radius_list.as_deref(),
            )?;
            Ok(shape_response(session, result))
        }

        Request::Chamfer {
            shape,
            distance,
            distance_list,
            edge_index_list,
        } => {
            let uniform = blend_size("distance", distance, distance_list.as_deref())?;
            let target = session.shapes.get(&shape)?;
            let result = session.ctx.fillets().chamfer_edges(
                target,
                uniform,
                edge_index_list.as_deref(),
                distance_list.as_deref(),
            )?;
            Ok(shape_response(session, result))
        }

        // -- Booleans --
        Request::Union { shapes: ids, keep_edges } => {
            let operands = session.shapes.get_all(&ids)?;
            let result = session.ctx.booleans().union(&operands, keep_edges)?;
            Ok(shape_response(session, result))
        }

        Request::Difference {
            shape,
            shapes: ids,
            keep_edges,
        } => {
            let base = session.shapes.get(&shape)?;
            let tools = session.shapes.get_all(&ids)?;
            let result = session.ctx.booleans().difference(base, &tools, keep_edges)?;
            Ok(shape_response(session, result))
        }

        Request::Intersection { shapes: ids, keep_edges } => {
            let operands = session.shapes.get_all(&ids)?;
            let result = session.ctx.booleans().intersection(&operands, keep_edges)?;
            Ok(shape_response(session, result))
        }

        Request::Transform {
            shape,
            translation,
            rotation_axis,
            rotation_angle,
            scale_factor,
        } => {
            let target = session.shapes.get(&shape)?;
            let result = session.ctx.transforms().transform(
                target,
                translation,
                rotation_axis,
                rotation_angle,
                scale_factor,
            )?;
            Ok(shape_response(session, result))
        }

        Request::Tessellate {
            shape,
            max_deviation,
            adjust_y_to_z,
        } => {
            let target = session.shapes.get(&shape)?;
            let mesh = session.ctx.tessellator().shape_to_mesh(target, max_deviation, adjust_y_to_z)?;
            Ok(Response::Mesh { mesh })
        }

        // -- Files --
        Request::Import { file_name, file_text } => {
            let shape = session.ctx.io().import(&file_name, &file_text)?;
            Ok(shape_response(session, shape))
        }

        Request::ExportStep { shape, file_name } => {
            let target = session.shapes.get(&shape)?;
            let text = session.ctx.io().export_step(target, &file_name)?;
            Ok(Response::File { text })
        }

        // -- Lifetime --
        Request::Release { shape } => {
            session.release(&shape)?;
            Ok(Response::Released { id: shape })
        }

        Request::Reset => Ok(Response::Reset {
            released: session.reset(),
        }),
    }
}

/// Uniform blend size; a per-edge list makes the uniform value optional.
fn blend_size(what: &str, uniform: Option<f64>, list: Option<&[f64]>) -> Result<f64, BridgeError> {
    match (uniform, list) {
        (Some(v), _) => Ok(v),
        (None, Some(_)) => Ok(0.0),
        (None, None) => Err(BridgeError::InvalidRequest {
            reason: format!("either {what} or a {what} list is required"),
        }),
    }
}

fn shape_response(session: &mut Session, shape: ShapeHandle) -> Response {
    let kind = shape.kind();
    let id = session.shapes.insert(shape);
    Response::Shape { id, kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_size() {
        assert_eq!(blend_size("radius", Some(0.5), None).unwrap(), 0.5);
        assert_eq!(blend_size("radius", None, Some(&[0.1][..])).unwrap(), 0.0);
        assert!(matches!(
            blend_size("radius", None, None),
            Err(BridgeError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_malformed_json_is_an_error_response() {
        let mut session = Session::mock();
        let out = dispatch_json(&mut session, "{not json");
        let resp: Response = serde_json::from_str(&out).unwrap();
        match resp {
            Response::Error { message, operation } => {
                assert!(message.starts_with("failed to parse message"));
                assert_eq!(operation, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
