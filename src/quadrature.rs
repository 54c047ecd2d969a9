use nalgebra::{Point2, Scalar};
use num::Zero;
use std::ops::{AddAssign, Mul};

pub mod total_order;

pub use total_order::QuadratureError;

/// Weights and points of a two-dimensional quadrature rule.
pub type QuadraturePair2d<T> = (Vec<T>, Vec<Point2<T>>);

/// A quadrature rule consisting of weights and points on the reference domain.
pub trait Quadrature2d<T>
where
    T: Scalar,
{
    fn weights(&self) -> &[T];
    fn points(&self) -> &[Point2<T>];

    /// Approximates the integral of the given function using this quadrature rule.
    fn integrate<U, Function>(&self, f: Function) -> U
    where
        Function: Fn(&Point2<T>) -> U,
        U: Zero + Mul<T, Output = U> + AddAssign<U>,
    {
        let mut integral = U::zero();
        for (w, p) in self.weights().iter().zip(self.points()) {
            integral += f(p) * w.clone();
        }
        integral
    }
}

impl<T, A, B> Quadrature2d<T> for (A, B)
where
    T: Scalar,
    A: AsRef<[T]>,
    B: AsRef<[Point2<T>]>,
{
    fn weights(&self) -> &[T] {
        self.0.as_ref()
    }

    fn points(&self) -> &[Point2<T>] {
        self.1.as_ref()
    }
}

impl<T, X> Quadrature2d<T> for &X
where
    T: Scalar,
    X: Quadrature2d<T>,
{
    fn weights(&self) -> &[T] {
        X::weights(self)
    }

    fn points(&self) -> &[Point2<T>] {
        X::points(self)
    }
}
