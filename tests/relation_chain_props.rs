use proptest::prelude::*;
use theta_xr::space::relation::{
    pose_from_parts, quat_from_axis_angle, RelationChain, RelationFlags, SpaceRelation, Vec3,
};

const EPSILON: f32 = 1e-3;

fn close(a: &SpaceRelation, b: &SpaceRelation) -> bool {
    let q = (a.pose.rotation.i * b.pose.rotation.i
        + a.pose.rotation.j * b.pose.rotation.j
        + a.pose.rotation.k * b.pose.rotation.k
        + a.pose.rotation.r * b.pose.rotation.r)
        .abs();
    a.flags == b.flags
        && (q - 1.0).abs() < EPSILON
        && (a.pose.translation - b.pose.translation).length() < EPSILON
        && (a.linear_velocity - b.linear_velocity).length() < EPSILON
        && (a.angular_velocity - b.angular_velocity).length() < EPSILON
}

fn component() -> impl Strategy<Value = f32> {
    -2.0f32..2.0
}

fn vec3() -> impl Strategy<Value = Vec3> {
    (component(), component(), component()).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn relation() -> impl Strategy<Value = SpaceRelation> {
    (
        vec3(),
        -3.0f32..3.0,
        vec3(),
        vec3(),
        vec3(),
        0u32..64,
    )
        .prop_filter("axis must not be degenerate", |(axis, ..)| axis.length() > 0.1)
        .prop_map(|(axis, angle, translation, linear, angular, bits)| {
            SpaceRelation::from_pose(pose_from_parts(
                quat_from_axis_angle(axis, angle),
                translation,
            ))
            .with_velocities(linear, angular)
            .with_flags(RelationFlags::from_bits_truncate(bits))
        })
}

proptest! {
    #[test]
    fn composition_is_associative(a in relation(), b in relation(), c in relation()) {
        let mut whole = RelationChain::new();
        whole.push_relation(&a).push_relation(&b).push_relation(&c);

        let mut head = RelationChain::new();
        head.push_relation(&a).push_relation(&b);
        let ab = head.resolve();
        let mut tail = RelationChain::new();
        tail.push_relation(&ab).push_relation(&c);

        prop_assert!(close(&whole.resolve(), &tail.resolve()));
    }

    #[test]
    fn validity_is_the_intersection_of_stages(a in relation(), b in relation()) {
        let mut chain = RelationChain::new();
        chain.push_relation(&a).push_relation(&b);
        prop_assert_eq!(chain.resolve().flags, a.flags & b.flags);
    }

    #[test]
    fn relation_then_inverse_is_identity(a in relation()) {
        let mut chain = RelationChain::new();
        chain.push_relation(&a).push_inverted_relation(&a);
        let resolved = chain.resolve();
        let identity = SpaceRelation::identity().with_flags(a.flags);
        prop_assert!(close(&resolved, &identity));
    }
}
