// Logout: POST /logout
//
// Sessions are stateless tokens, so logging out only clears the cookie. The
// device binding is left alone; the next login replaces it.

use std::sync::Arc;

use crate::context::AccessContext;
use crate::cookies::ResponseCookies;
use crate::routes::SuccessResponse;

#[derive(Debug)]
pub struct SignOutResult {
    pub response: SuccessResponse,
    pub cookies: ResponseCookies,
}

pub fn handle_sign_out(ctx: Arc<AccessContext>) -> SignOutResult {
    let mut cookies = ResponseCookies::new();
    cookies.expire_cookie(&ctx.session_cookie);
    SignOutResult {
        response: SuccessResponse::ok(),
        cookies,
    }
}
