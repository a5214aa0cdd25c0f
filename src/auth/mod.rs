mod forms;
mod middlewares;
mod services;
mod tokens;

pub use forms::{
    check_new_password, password_problems, validate_form, PasswordResetForm,
    PasswordResetRequestForm, SignInForm, SignUpForm,
};
pub use middlewares::{login_required_middleware, sessions_middleware, set_session_cookies};
pub use services::{
    activate, current_user, hash_password, request_password_reset, require_permission,
    require_user, reset_password, sign_in, sign_out, sign_up, verify_password,
};
pub use tokens::{EmailValidation, PasswordReset};
