//! services/api/src/adapters/otp.rs

use rand::Rng;
use shop_core::ports::OtpGenerator;

/// Uniformly random 6-digit codes from the thread-local RNG.
#[derive(Clone, Copy, Default)]
pub struct RandomOtpGenerator;

impl OtpGenerator for RandomOtpGenerator {
    fn generate(&self) -> String {
        let code: u32 = rand::rng().random_range(100_000..1_000_000);
        code.to_string()
    }
}
