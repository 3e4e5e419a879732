pub mod aes_cbc;
pub mod stratis_id;
pub mod validator;
