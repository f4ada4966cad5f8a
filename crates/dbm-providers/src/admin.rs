use crate::errors::Result;

/// Directorio de administradores (DBA) por negocio y familia de motor.
pub trait AdminDirectory: Send + Sync {
    /// Usuarios administradores de `group` (ej. "mysql") para el negocio.
    fn get_admins(&self, bk_biz_id: i64, group: &str) -> Result<Vec<String>>;
}
