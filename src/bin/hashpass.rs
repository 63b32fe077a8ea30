use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};

// Seeding helper: emit an argon2 PHC string for an app_user row.
fn main() {
    let password = std::env::args()
        .nth(1)
        .expect("Usage: hashpass <password>  (paste output into app_user.password_hash)");
    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string();
    println!("{phc}");
}
