pub use sieve_expr::*;
pub use {
    sieve_batch as batch, sieve_error as error, sieve_mask as mask, sieve_scan as scan,
};
