pub mod supabase;
pub mod whatsapp;

pub use supabase::SupabaseBackend;
