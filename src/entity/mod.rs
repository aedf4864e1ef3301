pub mod cart_items;
pub mod carts;
pub mod fixed_price_coupons;
pub mod order_items;
pub mod orders;
pub mod percentage_coupons;
pub mod products;
pub mod users;
pub mod vendor_bank_accounts;
pub mod vendor_payouts;

pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use fixed_price_coupons::Entity as FixedPriceCoupons;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use percentage_coupons::Entity as PercentageCoupons;
pub use products::Entity as Products;
pub use users::Entity as Users;
pub use vendor_bank_accounts::Entity as VendorBankAccounts;
pub use vendor_payouts::Entity as VendorPayouts;
