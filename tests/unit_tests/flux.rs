use hedge::error::OperatorError;
use hedge::flux::{
    dot, make_normal, penalty, AffineFlux, FaceGeometry, FluxExpr, FluxScalarPlaceholder, FluxType,
    FluxVectorPlaceholder,
};
use util::assert_panics;

fn geometry(normal: &[f64]) -> FaceGeometry<'_> {
    FaceGeometry { normal, penalty: 12.0 }
}

#[test]
fn central_flux_linearizes_to_average() {
    let u = FluxScalarPlaceholder::new(0);
    let normal = make_normal(2);
    let flux = u.avg() * normal[1].clone();

    let affine = flux.linearize(1, 1, &geometry(&[0.0, -1.0])).unwrap();
    assert_eq!(
        affine,
        AffineFlux {
            constant: 0.0,
            interior: vec![-0.5],
            exterior: vec![-0.5],
        }
    );
    assert_eq!(affine.evaluate(|_| 2.0, |_| 4.0), -3.0);
}

#[test]
fn penalized_jump_uses_face_penalty() {
    let w = FluxVectorPlaceholder::new(3);
    let u = w.component(2);
    let flux = 10.0 * penalty() * (u.int() - u.ext()) + FluxExpr::Constant(1.0);

    let affine = flux.linearize(3, 3, &geometry(&[1.0])).unwrap();
    assert_eq!(affine.constant, 1.0);
    assert_eq!(affine.interior, vec![0.0, 0.0, 120.0]);
    assert_eq!(affine.exterior, vec![0.0, 0.0, -120.0]);
}

#[test]
fn dot_with_normal() {
    let w = FluxVectorPlaceholder::new(2);
    let flux = dot(&w.int(), &make_normal(2));
    let affine = flux.linearize(2, 0, &geometry(&[0.6, 0.8])).unwrap();
    assert_eq!(affine.interior, vec![0.6, 0.8]);
    assert!(affine.exterior.is_empty());
    assert!(!affine.is_constant());
}

#[test]
fn zero_terms_are_elided() {
    let u = FluxScalarPlaceholder::new(0);
    assert_eq!(u.int() + FluxExpr::zero(), u.int());
    assert_eq!(0.0 * u.ext(), FluxExpr::zero());
    assert_eq!((u.int() + u.ext()).to_string(), "(int[0] + ext[0])");
}

#[test]
fn nonlinear_flux_is_rejected() {
    let u = FluxScalarPlaceholder::new(0);
    let flux = u.int() * u.ext();
    let result = flux.linearize(1, 1, &geometry(&[1.0]));
    assert!(matches!(result, Err(OperatorError::NonlinearFlux { .. })));
}

#[test]
fn missing_components_are_rejected() {
    let flux = FluxScalarPlaceholder::new(2).ext();
    assert_eq!(
        flux.linearize(3, 1, &geometry(&[1.0])),
        Err(OperatorError::InvalidFluxComponent {
            flux: "ext[2]".to_string(),
            available: 1
        })
    );

    let flux = make_normal(3)[2].clone();
    assert!(flux.linearize(1, 1, &geometry(&[1.0, 0.0])).is_err());
}

#[test]
fn vector_placeholder_components() {
    let w = FluxVectorPlaceholder::new(3);
    assert_eq!(w.len(), 3);
    assert!(!w.is_empty());
    assert_eq!(w.components().map(|c| c.index()).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(w.ext()[1], FluxExpr::Exterior(1));
    assert_panics!(w.component(3));
}

#[test]
fn flux_type_parsing() {
    assert_eq!("central".parse::<FluxType>(), Ok(FluxType::Central));
    assert_eq!("upwind".parse::<FluxType>(), Ok(FluxType::Upwind));
    assert_eq!(
        "lax-friedrichs".parse::<FluxType>(),
        Err(OperatorError::InvalidFluxType("lax-friedrichs".to_string()))
    );
    assert_eq!(FluxType::Upwind.to_string(), "upwind");
    assert_eq!(serde_json::to_string(&FluxType::Central).unwrap(), "\"central\"");
}
