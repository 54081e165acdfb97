//! Shamir polynomials, Feldman commitments and Lagrange interpolation
//!
//! Participant `i` always evaluates at `x = i + 1`, so index 0 never lands on
//! the secret.

use crate::group::encoding::{hex_points, hex_scalar};
use crate::group::{index_scalar, Curve};
use crate::{Error, ParticipantIndex, Result};
use elliptic_curve::group::{Group, GroupEncoding};
use elliptic_curve::Field;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use zeroize::Zeroize;

/// A share `f(index + 1)` of a secret polynomial
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Share<C: Curve> {
    pub index: ParticipantIndex,
    #[serde(with = "hex_scalar")]
    pub value: C::Scalar,
}

impl<C: Curve> Drop for Share<C> {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

impl<C: Curve> fmt::Debug for Share<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Secret polynomial of degree `t - 1`; coefficients are wiped on drop
#[derive(Clone)]
pub struct SecretPoly<C: Curve> {
    coefficients: Vec<C::Scalar>,
}

impl<C: Curve> SecretPoly<C> {
    /// Random polynomial with `threshold` coefficients and the given constant term
    pub fn random<R: RngCore + CryptoRng>(
        threshold: usize,
        secret: Option<C::Scalar>,
        rng: &mut R,
    ) -> Self {
        let mut coefficients = Vec::with_capacity(threshold);
        coefficients.push(secret.unwrap_or_else(|| C::Scalar::random(&mut *rng)));
        for _ in 1..threshold {
            coefficients.push(C::Scalar::random(&mut *rng));
        }
        Self { coefficients }
    }

    pub fn from_coefficients(coefficients: Vec<C::Scalar>) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(Error::InvalidConfig(
                "A polynomial needs at least one coefficient".into(),
            ));
        }
        Ok(Self { coefficients })
    }

    pub fn threshold(&self) -> usize {
        self.coefficients.len()
    }

    /// Constant term
    pub fn secret(&self) -> C::Scalar {
        self.coefficients[0]
    }

    pub fn coefficients(&self) -> &[C::Scalar] {
        &self.coefficients
    }

    /// Horner evaluation at `index + 1`
    pub fn eval(&self, index: ParticipantIndex) -> Share<C> {
        let x = index_scalar::<C>(index);
        let mut value = C::Scalar::ZERO;
        for coefficient in self.coefficients.iter().rev() {
            value = value * x + coefficient;
        }
        Share { index, value }
    }

    /// Commit every coefficient against `base`
    pub fn commit(&self, base: &C::Point) -> PublicPoly<C> {
        PublicPoly {
            commitments: self.coefficients.iter().map(|c| *base * c).collect(),
        }
    }

    /// Rebuild the full polynomial from at least `threshold` shares
    pub fn recover(shares: &[Share<C>], threshold: usize) -> Result<Self> {
        let selected = select_shares(shares, threshold)?;
        let xs: Vec<C::Scalar> = selected.iter().map(|s| index_scalar::<C>(s.index)).collect();

        let mut coefficients = vec![C::Scalar::ZERO; threshold];
        for (j, share) in selected.iter().enumerate() {
            // basis polynomial L_j(x) = prod_{m != j} (x - x_m) / (x_j - x_m)
            let mut basis = vec![C::Scalar::ONE];
            let mut denominator = C::Scalar::ONE;
            for (m, x_m) in xs.iter().enumerate() {
                if m == j {
                    continue;
                }
                let mut next = vec![C::Scalar::ZERO; basis.len() + 1];
                for (k, coefficient) in basis.iter().enumerate() {
                    next[k] -= *coefficient * x_m;
                    next[k + 1] += coefficient;
                }
                basis = next;
                denominator *= xs[j] - x_m;
            }
            let scale = Option::<C::Scalar>::from(denominator.invert())
                .ok_or_else(|| Error::Crypto("Lagrange denominator is zero".into()))?
                * share.value;
            for (k, coefficient) in basis.iter().enumerate() {
                coefficients[k] += *coefficient * scale;
            }
        }

        Ok(Self { coefficients })
    }
}

impl<C: Curve> Drop for SecretPoly<C> {
    fn drop(&mut self) {
        self.coefficients.zeroize();
    }
}

/// Commitments `c_k = a_k·B` to the coefficients of a secret polynomial
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PublicPoly<C: Curve> {
    #[serde(
        serialize_with = "hex_points::serialize",
        deserialize_with = "deserialize_commitments"
    )]
    commitments: Vec<C::Point>,
}

fn deserialize_commitments<'de, P, D>(deserializer: D) -> std::result::Result<Vec<P>, D::Error>
where
    P: GroupEncoding,
    D: Deserializer<'de>,
{
    let commitments = hex_points::deserialize(deserializer)?;
    if commitments.is_empty() {
        return Err(serde::de::Error::custom("Empty commitment polynomial"));
    }
    Ok(commitments)
}

impl<C: Curve> PublicPoly<C> {
    pub fn new(commitments: Vec<C::Point>) -> Result<Self> {
        if commitments.is_empty() {
            return Err(Error::InvalidConfig(
                "A commitment polynomial needs at least one coefficient".into(),
            ));
        }
        Ok(Self { commitments })
    }

    pub fn threshold(&self) -> usize {
        self.commitments.len()
    }

    pub fn commitments(&self) -> &[C::Point] {
        &self.commitments
    }

    /// Committed constant term
    pub fn public_key(&self) -> C::Point {
        self.commitments
            .first()
            .copied()
            .unwrap_or_else(C::Point::identity)
    }

    /// Evaluate in the exponent at `index + 1`
    pub fn eval(&self, index: ParticipantIndex) -> C::Point {
        let x = index_scalar::<C>(index);
        let mut value = C::Point::identity();
        for commitment in self.commitments.iter().rev() {
            value = value * x + commitment;
        }
        value
    }

    /// Whether `share·base` matches the committed polynomial
    pub fn check(&self, base: &C::Point, share: &Share<C>) -> bool {
        *base * share.value == self.eval(share.index)
    }

    /// Coefficient-wise sum of two commitment polynomials
    pub fn add(&self, other: &Self) -> Result<Self> {
        if self.commitments.len() != other.commitments.len() {
            return Err(Error::Crypto(format!(
                "Cannot add commitment polynomials of {} and {} coefficients",
                self.commitments.len(),
                other.commitments.len()
            )));
        }
        Ok(Self {
            commitments: self
                .commitments
                .iter()
                .zip(&other.commitments)
                .map(|(a, b)| *a + b)
                .collect(),
        })
    }
}

/// Lagrange coefficient at zero for participant `index` among `indices`
pub fn lagrange_coefficient<C: Curve>(
    index: ParticipantIndex,
    indices: &[ParticipantIndex],
) -> Result<C::Scalar> {
    let x_i = index_scalar::<C>(index);
    let mut numerator = C::Scalar::ONE;
    let mut denominator = C::Scalar::ONE;

    for &other in indices {
        if other == index {
            continue;
        }
        let x_j = index_scalar::<C>(other);
        numerator *= x_j;
        denominator *= x_j - x_i;
    }

    let inverse = Option::<C::Scalar>::from(denominator.invert())
        .ok_or_else(|| Error::Crypto("Lagrange denominator is zero".into()))?;
    Ok(numerator * inverse)
}

/// Recover `f(0)` from at least `threshold` shares
pub fn recover_secret<C: Curve>(shares: &[Share<C>], threshold: usize) -> Result<C::Scalar> {
    let selected = select_shares(shares, threshold)?;
    let indices: Vec<ParticipantIndex> = selected.iter().map(|s| s.index).collect();

    let mut secret = C::Scalar::ZERO;
    for share in &selected {
        secret += lagrange_coefficient::<C>(share.index, &indices)? * share.value;
    }
    Ok(secret)
}

/// Recover `f(0)·P` from at least `threshold` points `f(i + 1)·P`
pub fn recover_commit<C: Curve>(
    points: &[(ParticipantIndex, C::Point)],
    threshold: usize,
) -> Result<C::Point> {
    let selected = select_indexed(points, threshold, |(index, _)| *index)?;
    let indices: Vec<ParticipantIndex> = selected.iter().map(|(index, _)| *index).collect();

    let mut result = C::Point::identity();
    for (index, point) in &selected {
        result += *point * lagrange_coefficient::<C>(*index, &indices)?;
    }
    Ok(result)
}

fn select_shares<C: Curve>(shares: &[Share<C>], threshold: usize) -> Result<Vec<Share<C>>> {
    select_indexed(shares, threshold, |share| share.index)
}

/// Reject duplicates, require `threshold` entries and keep the `threshold`
/// lowest indices so every caller interpolates over the same subset.
fn select_indexed<T: Clone>(
    items: &[T],
    threshold: usize,
    index_of: impl Fn(&T) -> ParticipantIndex,
) -> Result<Vec<T>> {
    if threshold == 0 {
        return Err(Error::InvalidConfig("Threshold must be at least 1".into()));
    }

    let mut seen = BTreeSet::new();
    for item in items {
        if !seen.insert(index_of(item)) {
            return Err(Error::DuplicateShareIndex(index_of(item)));
        }
    }
    if items.len() < threshold {
        return Err(Error::InsufficientShares {
            required: threshold,
            actual: items.len(),
        });
    }

    let mut sorted = items.to_vec();
    sorted.sort_by_key(|item| index_of(item));
    sorted.truncate(threshold);
    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{Secp256k1, Suite};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    type C = Secp256k1;

    #[test]
    fn test_eval_matches_naive_evaluation() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let poly = SecretPoly::<C>::random(4, None, &mut rng);

        let x = k256::Scalar::from(3u64);
        let naive = poly.coefficients()[0]
            + poly.coefficients()[1] * x
            + poly.coefficients()[2] * x * x
            + poly.coefficients()[3] * x * x * x;

        assert_eq!(poly.eval(2).value, naive);
    }

    #[test]
    fn test_commitment_checks_shares() {
        let suite = Suite::<C>::new().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let poly = SecretPoly::<C>::random(3, None, &mut rng);
        let public = poly.commit(&suite.base());

        let share = poly.eval(4);
        assert!(public.check(&suite.base(), &share));
        assert_eq!(public.eval(4), suite.mul_base(&share.value));
        assert_eq!(public.public_key(), suite.mul_base(&poly.secret()));

        let bad = Share::<C> {
            index: 4,
            value: share.value + k256::Scalar::ONE,
        };
        assert!(!public.check(&suite.base(), &bad));
    }

    #[test]
    fn test_recover_secret_any_subset() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let secret = k256::Scalar::from(42u64);
        let poly = SecretPoly::<C>::random(3, Some(secret), &mut rng);
        let shares: Vec<_> = (0..5).map(|i| poly.eval(i)).collect();

        for subset in [[0, 1, 2], [0, 2, 4], [4, 3, 1]] {
            let picked: Vec<_> = subset.iter().map(|&i| shares[i].clone()).collect();
            assert_eq!(recover_secret(&picked, 3).unwrap(), secret);
        }
    }

    #[test]
    fn test_recover_secret_rejects_bad_input() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let poly = SecretPoly::<C>::random(3, None, &mut rng);

        let too_few = vec![poly.eval(0), poly.eval(1)];
        assert!(matches!(
            recover_secret(&too_few, 3),
            Err(Error::InsufficientShares {
                required: 3,
                actual: 2
            })
        ));

        let duplicated = vec![poly.eval(0), poly.eval(1), poly.eval(1)];
        assert!(matches!(
            recover_secret(&duplicated, 3),
            Err(Error::DuplicateShareIndex(1))
        ));
    }

    #[test]
    fn test_recover_full_polynomial() {
        let suite = Suite::<C>::new().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let poly = SecretPoly::<C>::random(4, None, &mut rng);
        let shares: Vec<_> = [6, 1, 3, 0].iter().map(|&i| poly.eval(i)).collect();

        let recovered = SecretPoly::<C>::recover(&shares, 4).unwrap();
        assert_eq!(recovered.coefficients(), poly.coefficients());
        assert_eq!(
            recovered.commit(&suite.base()),
            poly.commit(&suite.base())
        );
    }

    #[test]
    fn test_recover_commit_in_exponent() {
        let suite = Suite::<C>::new().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let poly = SecretPoly::<C>::random(3, None, &mut rng);
        let points: Vec<_> = [1, 2, 4]
            .iter()
            .map(|&i| (i, suite.mul_base(&poly.eval(i).value)))
            .collect();

        assert_eq!(
            recover_commit::<C>(&points, 3).unwrap(),
            suite.mul_base(&poly.secret())
        );
    }

    #[test]
    fn test_public_poly_add() {
        let suite = Suite::<C>::new().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let a = SecretPoly::<C>::random(3, None, &mut rng);
        let b = SecretPoly::<C>::random(3, None, &mut rng);

        let sum = a.commit(&suite.base()).add(&b.commit(&suite.base())).unwrap();
        assert_eq!(
            sum.eval(2),
            suite.mul_base(&(a.eval(2).value + b.eval(2).value))
        );

        let short = SecretPoly::<C>::random(2, None, &mut rng).commit(&suite.base());
        assert!(sum.add(&short).is_err());
    }

    #[test]
    fn test_share_debug_redacts_value() {
        let mut rng = ChaCha20Rng::seed_from_u64(14);
        let share = SecretPoly::<C>::random(2, None, &mut rng).eval(1);
        let secret_hex = crate::group::encoding::scalar_to_hex(&share.value);

        let printed = format!("{share:?}");
        assert!(printed.contains("index: 1"));
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains(&secret_hex));
    }

    #[test]
    fn test_empty_polynomials_rejected() {
        assert!(matches!(
            SecretPoly::<C>::from_coefficients(vec![]),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            PublicPoly::<C>::new(vec![]),
            Err(Error::InvalidConfig(_))
        ));
        assert!(serde_json::from_str::<PublicPoly<C>>(r#"{"commitments":[]}"#).is_err());

        let poly = SecretPoly::<C>::from_coefficients(vec![k256::Scalar::from(5u64)]).unwrap();
        assert_eq!(poly.secret(), k256::Scalar::from(5u64));

        let suite = Suite::<C>::new().unwrap();
        let json = serde_json::to_string(&poly.commit(&suite.base())).unwrap();
        let decoded: PublicPoly<C> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.public_key(), suite.mul_base(&poly.secret()));
    }
}
