pub mod filetype;
pub mod tagden;
pub mod r0v;
pub mod extract;
