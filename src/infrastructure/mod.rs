pub mod alpha_vantage_client;
