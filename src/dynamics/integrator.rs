use crate::core::types::Vector2;

/// Semi-implicit (symplectic) Euler step for a body in a gravitational field.
///
/// ```text
/// position' = position + velocity·dt + G·c·dt²
/// velocity' = velocity + G·c·dt
/// ```
///
/// where `c` is the field from [`GravityKernel`](super::GravityKernel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemiImplicitEuler {
    pub dt: f64,
    pub gravitational_constant: f64,
}

impl SemiImplicitEuler {
    pub fn new(dt: f64, gravitational_constant: f64) -> Self {
        Self {
            dt,
            gravitational_constant,
        }
    }

    /// Returns the next `(position, velocity)`.
    pub fn advance(
        &self,
        position: Vector2,
        velocity: Vector2,
        field: Vector2,
    ) -> (Vector2, Vector2) {
        let dt = self.dt;
        let acceleration = field * self.gravitational_constant;
        let next_position = position + velocity * dt + acceleration * (dt * dt);
        let next_velocity = velocity + acceleration * dt;
        (next_position, next_velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_field_moves_in_a_straight_line() {
        let euler = SemiImplicitEuler::new(0.5, 1.0);
        let (p, v) = euler.advance(Vector2::new(1.0, 2.0), Vector2::new(2.0, -4.0), Vector2::ZERO);
        assert_eq!(p, Vector2::new(2.0, 0.0));
        assert_eq!(v, Vector2::new(2.0, -4.0));
    }

    #[test]
    fn position_uses_updated_velocity() {
        let euler = SemiImplicitEuler::new(0.25, 2.0);
        let (p, v) = euler.advance(Vector2::ZERO, Vector2::new(1.0, 0.0), Vector2::new(0.0, 4.0));
        assert_eq!(v, Vector2::new(1.0, 2.0));
        assert_eq!(p, v * 0.25);
    }
}
